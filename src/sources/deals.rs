use crate::mapping::{ColumnSpec, ColumnType, SourceSpec};

fn base_columns() -> Vec<ColumnSpec> {
    use ColumnType::*;

    vec![
        ColumnSpec::nullable("Deal_Name", "deal_name", String),
        ColumnSpec::nullable("Owner", "owner", Json),
        ColumnSpec::nullable("Account_Name", "account_name", Json),
        ColumnSpec::nullable("Stage", "stage", String),
        ColumnSpec::nullable("Amount", "amount", Float),
        ColumnSpec::nullable("Closing_Date", "closing_date", Date),
        ColumnSpec::nullable("Probability", "probability", Integer),
        ColumnSpec::nullable("Type", "deal_type", String),
        ColumnSpec::nullable("Lead_Source", "lead_source", String),
        ColumnSpec::nullable("Next_Step", "next_step", String),
        ColumnSpec::nullable("Description", "description", String),
        ColumnSpec::nullable("Campaign_Source", "campaign_source", String),
        ColumnSpec::nullable("Contact_Name", "contact_name", Json),
        ColumnSpec::nullable("Created_Time", "created_time", Timestamp),
        ColumnSpec::nullable("Modified_Time", "modified_time", Timestamp),
        ColumnSpec::nullable("Created_By", "created_by", Json),
        ColumnSpec::nullable("Modified_By", "modified_by", Json),
        ColumnSpec::nullable("Tag", "tags", Json),
        // Applicant details captured on the deal
        ColumnSpec::nullable("First_Name", "first_name", String),
        ColumnSpec::nullable("Last_Name", "last_name", String),
        ColumnSpec::nullable("Email", "email", String),
        ColumnSpec::nullable("Phone", "phone", String),
        ColumnSpec::nullable("Mobile", "mobile", String),
        ColumnSpec::nullable("Date_of_Birth", "date_of_birth", Date),
        ColumnSpec::nullable("Age", "age", Integer),
        ColumnSpec::nullable("Gender", "gender", String),
        ColumnSpec::nullable("State", "state", String),
        ColumnSpec::nullable("Postcode", "postcode", String),
        ColumnSpec::nullable("Country", "country", String),
        ColumnSpec::nullable("Nationality", "nationality", String),
        // Course interest
        ColumnSpec::nullable("Course_Interested", "course_interested", String),
        ColumnSpec::nullable("Course_Level", "course_level", String),
        ColumnSpec::nullable("Course_Fees", "course_fees", Float),
        // Preferences and attribution
        ColumnSpec::nullable("Email_Opt_Out", "email_opt_out", Boolean),
        ColumnSpec::nullable("SMS_Opt_Out", "sms_opt_out", Boolean),
        ColumnSpec::nullable("utm_source", "utm_source", String),
        ColumnSpec::nullable("utm_medium", "utm_medium", String),
        ColumnSpec::nullable("utm_campaign", "utm_campaign", String),
    ]
}

/// Zoho Deals → `zoho_deals`, the day-to-day pipeline view.
pub fn spec() -> SourceSpec {
    SourceSpec {
        id: "deals",
        zoho_module: "Deals",
        table: "zoho_deals",
        key_column: "deal_id",
        columns: base_columns(),
    }
}

/// Zoho Deals → `zoho_deals_complete`: the same module with the
/// payment and enrolment columns the finance reports need.
pub fn complete_spec() -> SourceSpec {
    use ColumnType::*;

    let mut columns = base_columns();
    columns.extend(vec![
        ColumnSpec::nullable("Initial_Deposit_Received", "initial_deposit_received", String),
        ColumnSpec::nullable("Balance_Paid", "balance_paid", Integer),
        ColumnSpec::nullable("Final_Balance", "final_balance", Float),
        ColumnSpec::nullable("RTO_Name", "rto_name", String),
        ColumnSpec::nullable("RTO_Total_Fees", "rto_total_fees", Float),
        ColumnSpec::nullable("RTO_Payable_Due_Date", "rto_payable_due_date", Date),
        ColumnSpec::nullable("RTO_Paid", "rto_paid", String),
        ColumnSpec::nullable(
            "Date_of_Last_Successful_Payment",
            "date_of_last_successful_payment",
            Date,
        ),
        ColumnSpec::nullable(
            "Status_of_Last_Stripe_Debit",
            "status_of_last_stripe_debit",
            String,
        ),
        ColumnSpec::nullable("Terms_Conditions_Signed", "terms_conditions_signed", String),
        ColumnSpec::nullable("Is_the_Sale_Qualified", "is_sale_qualified", String),
        ColumnSpec::nullable("Welcome_Call_Date", "welcome_call_date", Date),
        ColumnSpec::nullable("Zoom_Registered", "zoom_registered", Boolean),
        ColumnSpec::nullable("USI_Number", "usi_number", String),
        ColumnSpec::nullable("Workplacement_Status", "workplacement_status", String),
    ]);

    SourceSpec {
        id: "deals_complete",
        zoho_module: "Deals",
        table: "zoho_deals_complete",
        key_column: "deal_id",
        columns,
    }
}
