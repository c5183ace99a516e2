use crate::mapping::{ColumnSpec, ColumnType, SourceSpec};

/// Zoho Leads → `zoho_leads`.
///
/// Zoho lookup fields (Owner, Created_By, Modified_By) land as JSON columns;
/// engagement counters default to zero rather than null so downstream
/// aggregates never divide by null.
pub fn spec() -> SourceSpec {
    use ColumnType::*;

    SourceSpec {
        id: "leads",
        zoho_module: "Leads",
        table: "zoho_leads",
        key_column: "lead_id",
        columns: vec![
            // Basic lead information
            ColumnSpec::nullable("Full_Name", "lead_name", String),
            ColumnSpec::nullable("Owner", "lead_owner", Json),
            ColumnSpec::nullable("Lead_Source", "lead_source", String),
            ColumnSpec::nullable("Lead_Status", "lead_status", String),
            ColumnSpec::nullable("Lead_Type", "lead_type", String),
            ColumnSpec::nullable("Lead_Status_Stage", "lead_status_stage", String),
            // Contact information
            ColumnSpec::nullable("Email", "email", String),
            ColumnSpec::nullable("Phone", "phone", String),
            ColumnSpec::nullable("Mobile", "mobile", String),
            ColumnSpec::nullable("Secondary_Email", "secondary_email", String),
            // Personal information
            ColumnSpec::nullable("First_Name", "first_name", String),
            ColumnSpec::nullable("Last_Name", "last_name", String),
            ColumnSpec::nullable("Title", "title", String),
            ColumnSpec::nullable("Company", "company", String),
            ColumnSpec::nullable("Industry", "industry", String),
            ColumnSpec::nullable("Date_of_Birth", "date_of_birth", Date),
            ColumnSpec::nullable("Visa_Type", "visa_type", String),
            // Address
            ColumnSpec::nullable("Street", "street", String),
            ColumnSpec::nullable("City", "city", String),
            ColumnSpec::nullable("State", "state", String),
            ColumnSpec::nullable("Zip_Code", "zip_code", String),
            ColumnSpec::nullable("Country", "country", String),
            // Marketing attribution
            ColumnSpec::nullable("utm_source", "utm_source", String),
            ColumnSpec::nullable("utm_campaign", "utm_campaign", String),
            ColumnSpec::nullable("utm_medium", "utm_medium", String),
            ColumnSpec::nullable("GCLID", "gclid", String),
            ColumnSpec::nullable("Cost_per_Click", "cost_per_click", Float),
            ColumnSpec::nullable("Cost_per_Conversion", "cost_per_conversion", Float),
            // Engagement scoring
            ColumnSpec::zeroed("Visitor_Score", "visitor_score", Integer),
            ColumnSpec::nullable("Average_Time_Spent_Minutes", "average_time_spent", Float),
            ColumnSpec::zeroed("Number_Of_Chats", "number_of_chats", Integer),
            ColumnSpec::zeroed("Days_Visited", "days_visited", Integer),
            // Preferences and flags
            ColumnSpec::nullable("Email_Opt_Out", "email_opt_out", Boolean),
            ColumnSpec::nullable("SMS_Opt_Out", "sms_opt_out", Boolean),
            ColumnSpec::nullable("DO_NOT_CALL", "do_not_call", Boolean),
            ColumnSpec::nullable("is_this_a_Test_Lead", "is_test_lead", Boolean),
            // Free text and system fields
            ColumnSpec::nullable("Description", "description", String),
            ColumnSpec::nullable("Created_Time", "created_time", Timestamp),
            ColumnSpec::nullable("Modified_Time", "modified_time", Timestamp),
            ColumnSpec::nullable("Created_By", "created_by", Json),
            ColumnSpec::nullable("Modified_By", "modified_by", Json),
        ],
    }
}
