//! Read-query intents.
//!
//! A [`QueryIntent`] picks a filter template, an ordering or grouping directive
//! and a projection. Planning turns it into a [`QueryPlan`]: SQL text plus the
//! bound parameters. Day figures are always bound, never formatted into the
//! text, and every date comparison is made against the database's
//! `current_date`.

use crate::record::PurchaseRecord;
use crate::schema::{ColumnSet, JoinKind, Table};
use crate::statement::{from_clause, SelectStatement, SqlValue};
use crate::{error::Result, Error};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Status names as stored in the `statuses` lookup table.
pub mod status {
    /// Decided to take part, application not filed yet.
    pub const GO: &str = "идем";
    /// Cost estimation in progress.
    pub const ESTIMATION: &str = "расчет";
    /// Admitted to the auction.
    pub const ADMITTED: &str = "допущены";
    /// Application filed.
    pub const APPLIED: &str = "заявлены";
    pub const WON: &str = "выиграли";
    pub const LOST: &str = "не выиграли";
}

const GOING: [&str; 2] = [status::GO, status::ESTIMATION];
const AUCTION: [&str; 2] = [status::ADMITTED, status::APPLIED];
const FINISHED: [&str; 2] = [status::WON, status::LOST];

const STATUS: &str = "statuses.status_name";
const BIDDING: &str = "purchase_registry.bidding";
const COLLECTING: &str = "purchase_registry.collecting";

const ORDER_BY_BIDDING: &[&str] = &[BIDDING];
const GROUP_BY_PARTICIPANT: &[&str] = &["purchase_registry.our_participants", STATUS];

/// Enumerated read-query variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Every record, no filter.
    General,
    /// Today's auctions and applications due by the next business day.
    Today,
    /// Upcoming auctions and application deadlines.
    Future,
    /// Finished purchases.
    Past,
    TodayAuction,
    TodayGo,
    FutureAuction,
    FutureGo,
    /// Application guarantee totals per participant and status.
    FutureMoney,
}

impl QueryIntent {
    pub const ALL: [QueryIntent; 9] = [
        QueryIntent::General,
        QueryIntent::Today,
        QueryIntent::Future,
        QueryIntent::Past,
        QueryIntent::TodayAuction,
        QueryIntent::TodayGo,
        QueryIntent::FutureAuction,
        QueryIntent::FutureGo,
        QueryIntent::FutureMoney,
    ];

    /// Which column set rows of this intent are projected onto.
    pub fn projection(self) -> ColumnSet {
        match self {
            QueryIntent::FutureMoney => ColumnSet::Aggregate,
            _ => ColumnSet::Read,
        }
    }

    /// Whether the filter depends on the business-day rollover.
    pub fn needs_rollover(self) -> bool {
        matches!(self, QueryIntent::Today | QueryIntent::TodayGo)
    }

    /// Build the statement for this intent.
    ///
    /// `today` is the weekday of the database's current date; it only matters
    /// for intents that look ahead to the next business day.
    pub fn plan(self, day_limit: u32, today: Weekday) -> Result<QueryPlan> {
        let table = Table::PurchaseRegistry;
        let days = i32::try_from(day_limit)
            .map_err(|_| Error::InvalidArgument(format!("day limit {day_limit} is too large")))?;

        let mut params = Params::default();
        let condition = self.condition(days, today, &mut params);

        let projection = self.projection();
        let columns = table.columns(projection);
        let select = SelectStatement::new(from_clause(table, JoinKind::Left), columns)
            .filter(condition);
        let select = match self {
            QueryIntent::FutureMoney => select.group_by(GROUP_BY_PARTICIPANT),
            _ => select.order_by(ORDER_BY_BIDDING),
        };

        Ok(QueryPlan {
            intent: self,
            sql: select.build(),
            params: params.values,
            projection,
        })
    }

    fn condition(self, days: i32, today: Weekday, params: &mut Params) -> String {
        match self {
            QueryIntent::General => String::new(),
            QueryIntent::Today => format!(
                "{} OR {}",
                auction_today(),
                going_next_business_day(today, params)
            ),
            QueryIntent::TodayAuction => auction_today(),
            QueryIntent::TodayGo => going_next_business_day(today, params),
            QueryIntent::Future => {
                let auctions = group(&AUCTION, &forward(BIDDING, days, params));
                let going = group(&GOING, &forward(COLLECTING, days, params));
                format!("{auctions} OR {going}")
            }
            QueryIntent::FutureAuction => group(&AUCTION, &forward(BIDDING, days, params)),
            QueryIntent::FutureGo | QueryIntent::FutureMoney => {
                group(&GOING, &forward(COLLECTING, days, params))
            }
            QueryIntent::Past => group(&FINISHED, &backward(BIDDING, days, params)),
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryIntent::General => "general",
            QueryIntent::Today => "today",
            QueryIntent::Future => "future",
            QueryIntent::Past => "past",
            QueryIntent::TodayAuction => "today_auction",
            QueryIntent::TodayGo => "today_go",
            QueryIntent::FutureAuction => "future_auction",
            QueryIntent::FutureGo => "future_go",
            QueryIntent::FutureMoney => "future_money",
        };
        f.write_str(name)
    }
}

/// Days to add to `today` to reach the next business day.
///
/// Applications are not processed over the weekend, so Friday rolls over to
/// Monday.
pub fn rollover_days(today: Weekday) -> i32 {
    match today {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    }
}

/// A planned read: SQL text, its bind parameters and how to map its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub intent: QueryIntent,
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub projection: ColumnSet,
}

impl QueryPlan {
    /// Look up one record by its surrogate id.
    pub fn by_id(id: i64) -> Result<Self> {
        if id == 0 {
            return Err(Error::InvalidArgument(format!("invalid identifier {id}")));
        }

        let table = Table::PurchaseRegistry;
        let condition = format!(
            "{}.{} = $1",
            table.name(),
            table.primary_key(crate::schema::KeyKind::Surrogate)
        );
        let sql = SelectStatement::new(
            from_clause(table, JoinKind::Left),
            table.columns(ColumnSet::Read),
        )
        .filter(condition)
        .build();

        Ok(Self {
            intent: QueryIntent::General,
            sql,
            params: vec![SqlValue::BigInt(Some(id))],
            projection: ColumnSet::Read,
        })
    }
}

impl PurchaseRecord {
    /// Intent this row is grouped under downstream.
    ///
    /// Rows of the combined `Today` query split into auctions and applications
    /// by status; every other row keeps the intent that produced it.
    pub fn group(&self) -> Option<QueryIntent> {
        match self.intent? {
            QueryIntent::Today => {
                let going = self
                    .status
                    .as_deref()
                    .is_some_and(|s| GOING.contains(&s));
                Some(if going {
                    QueryIntent::TodayGo
                } else {
                    QueryIntent::TodayAuction
                })
            }
            other => Some(other),
        }
    }
}

/// Bind parameters collected while a condition is rendered.
#[derive(Debug, Default)]
struct Params {
    values: Vec<SqlValue>,
}

impl Params {
    /// Bind a day count and return its placeholder.
    fn days(&mut self, days: i32) -> String {
        self.values.push(SqlValue::Int(Some(days)));
        format!("${}::int", self.values.len())
    }
}

fn status_in(statuses: &[&str]) -> String {
    let quoted: Vec<String> = statuses.iter().map(|s| format!("'{s}'")).collect();
    format!("{STATUS} IN ({})", quoted.join(", "))
}

fn group(statuses: &[&str], window: &str) -> String {
    format!("({} AND {})", status_in(statuses), window)
}

fn auction_today() -> String {
    group(
        &AUCTION,
        &format!("date_trunc('day', {BIDDING}) = current_date::timestamp"),
    )
}

fn going_next_business_day(today: Weekday, params: &mut Params) -> String {
    let days = params.days(rollover_days(today));
    group(
        &GOING,
        &format!("date_trunc('day', {COLLECTING}) = (current_date + {days})::timestamp"),
    )
}

/// Window starting tomorrow; open-ended when `days` is zero.
fn forward(column: &str, days: i32, params: &mut Params) -> String {
    if days == 0 {
        return format!("{column} >= (current_date + 1)::timestamp");
    }
    let days = params.days(days);
    format!("{column} BETWEEN (current_date + 1)::timestamp AND (current_date + {days})::timestamp")
}

/// Window ending today; open-ended when `days` is zero.
fn backward(column: &str, days: i32, params: &mut Params) -> String {
    if days == 0 {
        return format!("{column} < current_date::timestamp");
    }
    let days = params.days(days);
    format!("{column} BETWEEN (current_date - {days})::timestamp AND current_date::timestamp")
}
