//! Typed catalogue of the dashboard backend's endpoints.
//!
//! Builds the [`ReadRequest`]s and [`WriteRequest`]s the UI sends through the
//! dispatcher, so paths, query strings and payload shapes live in one place.

use crate::dispatcher::{ReadRequest, WriteRequest};
use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use serde_json::json;
use stockroom_types::Partition;

pub const INVENTORY: &str = "/api/inventory";
pub const TRANSACTIONS: &str = "/api/transactions";
pub const SALES: &str = "/api/sales";
pub const EXPENSES: &str = "/api/expenses";
pub const DASHBOARD_METRICS: &str = "/api/dashboard-metrics";
pub const SALES_SUMMARY: &str = "/api/sales-summary";
pub const EXPENSES_SUMMARY: &str = "/api/expenses-summary";
pub const ADD_ENTRY: &str = "/api/add-entry";
pub const UPDATE_REORDER: &str = "/api/update-reorder";
pub const CREATE_SALE: &str = "/api/create-sale";
pub const ADD_EXPENSE: &str = "/api/add-expense";

/// Appends the non-empty pairs as an encoded query string.
fn with_query(path: &str, pairs: &[(&str, Option<&str>)]) -> String {
    let query: Vec<String> = pairs
        .iter()
        .filter_map(|&(key, value)| {
            let value = value.map(str::trim).filter(|v| !v.is_empty())?;
            Some(format!("{key}={}", urlencoding::encode(value)))
        })
        .collect();

    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", query.join("&"))
    }
}

fn with_segment(prefix: &str, segment: &str) -> String {
    format!("{prefix}/{}", urlencoding::encode(segment))
}

/// Partition view: a whole-collection mirror when unfiltered, a merge otherwise.
fn partition_view(
    partition: Partition,
    path: &str,
    pairs: &[(&str, Option<&str>)],
) -> ReadRequest {
    let endpoint = with_query(path, pairs);
    if endpoint == path {
        ReadRequest::collection(partition, endpoint)
    } else {
        ReadRequest::filtered(partition, endpoint)
    }
}

// ── Views ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub date: Option<String>,
    /// `Intake` or `Supply`; `None` (or `All`) returns both.
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesFilter {
    pub date: Option<String>,
    /// Substring match on the customer name.
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    pub date: Option<String>,
    pub category: Option<String>,
}

pub fn inventory() -> ReadRequest {
    ReadRequest::collection(Partition::Inventory, INVENTORY)
}

pub fn transactions(filter: &TransactionFilter) -> ReadRequest {
    let kind = filter.kind.as_deref().filter(|k| *k != "All");
    partition_view(
        Partition::Transactions,
        TRANSACTIONS,
        &[("date", filter.date.as_deref()), ("type", kind)],
    )
}

pub fn sales(filter: &SalesFilter) -> ReadRequest {
    partition_view(
        Partition::Sales,
        SALES,
        &[
            ("customer", filter.customer.as_deref()),
            ("date", filter.date.as_deref()),
        ],
    )
}

pub fn expenses(filter: &ExpenseFilter) -> ReadRequest {
    partition_view(
        Partition::Expenses,
        EXPENSES,
        &[
            ("date", filter.date.as_deref()),
            ("category", filter.category.as_deref()),
        ],
    )
}

pub fn dashboard_metrics(date: Option<&str>) -> ReadRequest {
    ReadRequest::response(with_query(DASHBOARD_METRICS, &[("date", date)]))
}

pub fn sales_summary(date: Option<&str>) -> ReadRequest {
    ReadRequest::response(with_query(SALES_SUMMARY, &[("date", date)]))
}

pub fn expenses_summary(date: Option<&str>) -> ReadRequest {
    ReadRequest::response(with_query(EXPENSES_SUMMARY, &[("date", date)]))
}

pub fn sale_detail(sale_num: &str) -> ReadRequest {
    ReadRequest::response(with_segment("/api/sale", sale_num))
}

/// Unfiltered collection views, re-read after every drain.
pub fn collection_views() -> Vec<ReadRequest> {
    vec![
        inventory(),
        transactions(&TransactionFilter::default()),
        sales(&SalesFilter::default()),
        expenses(&ExpenseFilter::default()),
    ]
}

// ── Writes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Stock received.
    Intake,
    /// Stock issued.
    Supply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub name: String,
    #[serde(default)]
    pub brand: String,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Credit,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSale {
    pub customer: String,
    pub items: Vec<SaleItem>,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub category: String,
    pub amount: f64,
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub notes: String,
}

pub fn add_entry(entry: &NewEntry) -> SyncResult<WriteRequest> {
    Ok(WriteRequest::post(ADD_ENTRY, serde_json::to_value(entry)?))
}

pub fn update_reorder(name: &str, level: u32) -> WriteRequest {
    WriteRequest::post(UPDATE_REORDER, json!({ "name": name, "level": level }))
}

pub fn create_sale(sale: &NewSale) -> SyncResult<WriteRequest> {
    Ok(WriteRequest::post(CREATE_SALE, serde_json::to_value(sale)?))
}

pub fn update_sale_status(sale_num: &str, status: PaymentStatus) -> SyncResult<WriteRequest> {
    Ok(WriteRequest::post(
        with_segment("/api/update-sale-status", sale_num),
        json!({ "status": serde_json::to_value(status)? }),
    ))
}

pub fn add_expense(expense: &NewExpense) -> SyncResult<WriteRequest> {
    Ok(WriteRequest::post(ADD_EXPENSE, serde_json::to_value(expense)?))
}

pub fn delete_product(id: i64) -> WriteRequest {
    WriteRequest::delete(format!("/api/delete-product/{id}"))
}

pub fn delete_transaction(id: i64) -> WriteRequest {
    WriteRequest::delete(format!("/api/delete-transaction/{id}"))
}

pub fn delete_expense(id: i64) -> WriteRequest {
    WriteRequest::delete(format!("/api/delete-expense/{id}"))
}

pub fn delete_sale(sale_num: &str) -> WriteRequest {
    WriteRequest::delete(with_segment("/api/delete-sale", sale_num))
}
