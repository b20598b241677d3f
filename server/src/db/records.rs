//! Row mapping and argument binding for purchase records.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use torgi_engine::{ColumnSet, PurchaseRecord, SqlValue};

/// A query with positional Postgres arguments.
pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Bind `values` to `query` in order.
pub fn bind_values<'q>(query: PgQuery<'q>, values: &[SqlValue]) -> PgQuery<'q> {
    values.iter().fold(query, |query, value| match value {
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::BigInt(v) => query.bind(*v),
        SqlValue::Double(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    })
}

/// A purchase row from the read projection.
#[derive(Debug)]
pub struct StoredPurchase {
    record: PurchaseRecord,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredPurchase {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredPurchase {
            record: PurchaseRecord {
                purchase_id: row.try_get("purchase_id")?,
                registry_number: row.try_get("registry_number")?,
                purchase_subject: row.try_get("purchase_subject")?,
                purchase_subject_abbr: row.try_get("purchase_string_code_name")?,
                purchase_type: row.try_get("purchase_type_name")?,
                collecting: row.try_get("collecting")?,
                approval: row.try_get("approval_date")?,
                bidding: row.try_get("bidding")?,
                region: row.try_get("region_name")?,
                customer_type: row.try_get("customer_type_name")?,
                max_price: row.try_get("max_price")?,
                application_guarantee: row.try_get("application_guarantee")?,
                contract_guarantee: row.try_get("contract_guarantee")?,
                status: row.try_get("status_name")?,
                our_participants: row.try_get("our_participants")?,
                estimation: row.try_get("estimation")?,
                etp: row.try_get("etp_name")?,
                winner: row.try_get("winner")?,
                winner_price: row.try_get("winner_price")?,
                participants: row.try_get("participants")?,
                ..Default::default()
            },
        })
    }
}

impl StoredPurchase {
    pub fn into_record(self) -> PurchaseRecord {
        self.record
    }
}

/// A row of the guarantee aggregate: money held per participant and status.
#[derive(Debug)]
pub struct StoredGuarantee {
    pub our_participants: Option<String>,
    pub status: Option<String>,
    pub application_guarantee: Option<f64>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredGuarantee {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredGuarantee {
            our_participants: row.try_get("our_participants")?,
            status: row.try_get("status_name")?,
            application_guarantee: row.try_get("application_guarantee")?,
        })
    }
}

impl StoredGuarantee {
    /// Aggregate rows carry no identity; only the grouped fields are set.
    pub fn into_record(self) -> PurchaseRecord {
        PurchaseRecord {
            our_participants: self.our_participants,
            status: self.status,
            application_guarantee: self.application_guarantee,
            ..Default::default()
        }
    }
}

/// Map a row produced by a query with the given projection.
pub fn record_from_row(row: &PgRow, projection: ColumnSet) -> Result<PurchaseRecord, sqlx::Error> {
    use sqlx::FromRow;

    match projection {
        ColumnSet::Aggregate => StoredGuarantee::from_row(row).map(StoredGuarantee::into_record),
        ColumnSet::Read | ColumnSet::Write => {
            StoredPurchase::from_row(row).map(StoredPurchase::into_record)
        }
    }
}
