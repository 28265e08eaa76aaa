//! Query pattern analysis and index hints.
//!
//! Categories and index rules are a fixed keyword table over the
//! normalized query text. The suggestions are hints for a human to review,
//! not the output of a query planner.

use std::collections::BTreeMap;

use serde::Serialize;

use pulse_core::QuerySignature;

/// Domain area a query touches, by first keyword match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Transaction,
    User,
    Account,
    Category,
    Report,
    Other,
}

impl QueryCategory {
    const RULES: [(&'static str, QueryCategory); 5] = [
        ("transaction", QueryCategory::Transaction),
        ("user", QueryCategory::User),
        ("account", QueryCategory::Account),
        ("category", QueryCategory::Category),
        ("report", QueryCategory::Report),
    ];

    /// Classifies a query; the first keyword found wins.
    pub fn classify(query: &str) -> Self {
        let lowered = query.to_lowercase();
        Self::RULES
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, category)| *category)
            .unwrap_or(QueryCategory::Other)
    }
}

/// Aggregate of one signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequentQuery {
    pub signature: QuerySignature,
    /// Normalized text of the query.
    pub query: String,
    pub count: usize,
    pub avg_duration_ms: f64,
    pub category: QueryCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPatterns {
    /// Top signatures by execution count.
    pub most_frequent_queries: Vec<FrequentQuery>,
    /// Executions per category, over every signature.
    pub query_distribution: BTreeMap<QueryCategory, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Btree,
    Hash,
    Gin,
    Gist,
}

/// A candidate index for a slow, frequent query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSuggestion {
    /// Signature that triggered the suggestion.
    pub signature: QuerySignature,
    pub table: String,
    pub columns: Vec<String>,
    pub index_type: IndexType,
    pub reason: String,
    pub estimated_improvement_percent: u8,
}

impl IndexSuggestion {
    /// Looks up the rule for a category; only some categories have one.
    pub fn for_query(query: &FrequentQuery) -> Option<Self> {
        let (table, columns, reason, improvement): (&str, &[&str], &str, u8) = match query.category
        {
            QueryCategory::Transaction => (
                "Transaction",
                &["userId", "createdAt"],
                "Frequent user transaction queries with date filtering",
                40,
            ),
            QueryCategory::User => ("User", &["email"], "Frequent user lookup by email", 60),
            _ => return None,
        };

        Some(Self {
            signature: query.signature.clone(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            index_type: IndexType::Btree,
            reason: reason.to_string(),
            estimated_improvement_percent: improvement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frequent(query: &str, avg: f64) -> FrequentQuery {
        FrequentQuery {
            signature: QuerySignature::of(query),
            query: query.to_string(),
            count: 10,
            avg_duration_ms: avg,
            category: QueryCategory::classify(query),
        }
    }

    #[test]
    fn test_first_keyword_wins() {
        // "userId" would also match the user rule
        assert_eq!(
            QueryCategory::classify(r#"SELECT * FROM "Transaction" WHERE "userId" = ?"#),
            QueryCategory::Transaction
        );
        assert_eq!(
            QueryCategory::classify("SELECT * FROM users WHERE email = ?"),
            QueryCategory::User
        );
        assert_eq!(
            QueryCategory::classify("UPDATE accounts SET balance = ?"),
            QueryCategory::Account
        );
        assert_eq!(
            QueryCategory::classify("monthly-report:2024-05"),
            QueryCategory::Report
        );
        assert_eq!(QueryCategory::classify("SELECT 1"), QueryCategory::Other);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&QueryCategory::Transaction).unwrap();
        assert_eq!(json, r#""transaction""#);
    }

    #[test]
    fn test_rules_by_category() {
        let tx = IndexSuggestion::for_query(&frequent("SELECT * FROM transactions", 900.0)).unwrap();
        assert_eq!(tx.table, "Transaction");
        assert_eq!(tx.columns, vec!["userId", "createdAt"]);
        assert_eq!(tx.estimated_improvement_percent, 40);

        let user = IndexSuggestion::for_query(&frequent("SELECT * FROM users", 900.0)).unwrap();
        assert_eq!(user.table, "User");
        assert_eq!(user.columns, vec!["email"]);
        assert_eq!(user.index_type, IndexType::Btree);

        assert!(IndexSuggestion::for_query(&frequent("SELECT * FROM accounts", 900.0)).is_none());
    }
}
