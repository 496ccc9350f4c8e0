//! Parameterized filters for the payment listing. Column names come from a
//! fixed whitelist; every value goes through `push_bind`.

use crate::domain::payment::Payment;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Like,
    Gte,
    Lte,
}

impl Operator {
    fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => " = ",
            Operator::Like => " ILIKE ",
            Operator::Gte => " >= ",
            Operator::Lte => " <= ",
        }
    }
}

/// Filterable columns and the operators each one accepts.
const COLUMNS: &[(&str, &[Operator])] = &[
    ("status", &[Operator::Eq]),
    ("currency", &[Operator::Eq]),
    ("order_id", &[Operator::Eq, Operator::Like]),
    ("transaction_id", &[Operator::Eq]),
    ("customer_id", &[Operator::Eq]),
    ("created_at", &[Operator::Gte, Operator::Lte]),
];

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Time(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: &'static str,
    operator: Operator,
    value: FilterValue,
}

/// Query-string shape of `GET /payments`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPaymentsQuery {
    pub status: Option<String>,
    pub currency: Option<String>,
    pub order_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFilter {
    pub platform_id: i64,
    conditions: Vec<Condition>,
    pub page: i64,
    pub per_page: i64,
}

impl PaymentFilter {
    pub fn new(platform_id: i64) -> Self {
        Self {
            platform_id,
            conditions: Vec::new(),
            page: 1,
            per_page: 20,
        }
    }

    pub fn with(mut self, column: &str, operator: Operator, value: FilterValue) -> Result<Self, PaymentError> {
        let (name, allowed) = COLUMNS
            .iter()
            .find(|(name, _)| *name == column)
            .ok_or_else(|| PaymentError::Validation(format!("cannot filter on `{column}`")))?;
        if !allowed.contains(&operator) {
            return Err(PaymentError::Validation(format!(
                "operator not allowed on `{column}`"
            )));
        }
        self.conditions.push(Condition {
            column: name,
            operator,
            value,
        });
        Ok(self)
    }

    pub fn from_query(platform_id: i64, q: &ListPaymentsQuery) -> Result<Self, PaymentError> {
        let mut f = Self::new(platform_id);
        if let Some(status) = &q.status {
            f = f.with("status", Operator::Eq, FilterValue::Text(status.to_ascii_lowercase()))?;
        }
        if let Some(currency) = &q.currency {
            f = f.with("currency", Operator::Eq, FilterValue::Text(currency.to_ascii_uppercase()))?;
        }
        if let Some(order_id) = &q.order_id {
            f = f.with("order_id", Operator::Like, FilterValue::Text(format!("%{order_id}%")))?;
        }
        if let Some(from) = q.from {
            f = f.with("created_at", Operator::Gte, FilterValue::Time(from))?;
        }
        if let Some(to) = q.to {
            f = f.with("created_at", Operator::Lte, FilterValue::Time(to))?;
        }
        f.page = q.page.unwrap_or(1).max(1);
        f.per_page = q.per_page.unwrap_or(20).clamp(1, 100);
        Ok(f)
    }

    /// Same predicate as the generated WHERE clause, evaluated in memory.
    pub fn matches(&self, payment: &Payment) -> bool {
        payment.platform_id == self.platform_id
            && self.conditions.iter().all(|c| {
                let text = match c.column {
                    "status" => payment.status.as_str().to_string(),
                    "currency" => payment.currency.as_str().to_string(),
                    "order_id" => payment.order_id.clone(),
                    "transaction_id" => payment.transaction_id.clone(),
                    "customer_id" => payment.customer.id.clone(),
                    _ => String::new(),
                };
                match (&c.operator, &c.value) {
                    (Operator::Eq, FilterValue::Text(v)) => &text == v,
                    (Operator::Like, FilterValue::Text(v)) => text
                        .to_ascii_lowercase()
                        .contains(&v.trim_matches('%').to_ascii_lowercase()),
                    (Operator::Gte, FilterValue::Time(t)) => payment.created_at >= *t,
                    (Operator::Lte, FilterValue::Time(t)) => payment.created_at <= *t,
                    _ => false,
                }
            })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    fn push_where<'a>(&'a self, qb: &mut QueryBuilder<'a, Postgres>) {
        qb.push(" WHERE platform_id = ");
        qb.push_bind(self.platform_id);
        for c in &self.conditions {
            qb.push(" AND ");
            qb.push(c.column);
            qb.push(c.operator.sql());
            match &c.value {
                FilterValue::Text(v) => qb.push_bind(v.as_str()),
                FilterValue::Time(v) => qb.push_bind(*v),
            };
        }
    }

    pub fn select<'a>(&'a self, columns: &str) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM payments"));
        self.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(self.per_page);
        qb.push(" OFFSET ");
        qb.push_bind(self.offset());
        qb
    }

    pub fn count(&self) -> QueryBuilder<'_, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM payments");
        self.push_where(&mut qb);
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_columns_are_rejected() {
        let err = PaymentFilter::new(1)
            .with("amount; DROP TABLE payments", Operator::Eq, FilterValue::Text("1".to_string()))
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn values_are_bound_not_interpolated() {
        let q = ListPaymentsQuery {
            order_id: Some("x' OR '1'='1".to_string()),
            status: Some("PENDING".to_string()),
            ..Default::default()
        };
        let f = PaymentFilter::from_query(7, &q).unwrap();
        let qb = f.select("id");
        let sql = qb.sql();
        assert!(sql.contains("order_id ILIKE $"));
        assert!(!sql.contains("OR '1'='1"));
        assert!(sql.contains("status = $"));
    }

    #[test]
    fn like_is_not_allowed_on_status() {
        let err = PaymentFilter::new(1)
            .with("status", Operator::Like, FilterValue::Text("p%".to_string()))
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }
}
