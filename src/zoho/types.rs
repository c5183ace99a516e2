use serde::Deserialize;
use serde_json::Value;

// https://www.zoho.com/crm/developer/docs/api/v2/get-records.html
#[derive(Debug, Deserialize)]
pub struct RecordsResponse {
    #[serde(default)]
    pub data: Vec<serde_json::Map<String, Value>>,
    pub info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub more_records: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_response() {
        let body = r#"{
            "data": [
                {"id": "1", "Last_Name": "Nguyen"},
                {"id": "2", "Last_Name": "Singh"}
            ],
            "info": {"per_page": 200, "count": 2, "page": 1, "more_records": true}
        }"#;
        let response: RecordsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.len(), 2);
        assert!(response.info.unwrap().more_records);
    }

    #[test]
    fn test_parse_response_without_info() {
        let body = r#"{"data": []}"#;
        let response: RecordsResponse = serde_json::from_str(body).unwrap();
        assert!(response.data.is_empty());
        assert!(response.info.is_none());
    }
}
