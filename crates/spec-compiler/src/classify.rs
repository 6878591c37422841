//! Turns raw category records into a validated, numbered [`TestSuite`].

use caseforge_core_types::{Category, TestCase, TestSuite};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::{CompileError, ValidationError};
use crate::parser::RawCategories;

/// Suite plus the records that were dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub suite: TestSuite,
    pub rejected: Vec<ValidationError>,
}

struct ValidRecord {
    title: String,
    description: String,
    steps: Vec<String>,
    expected_result: String,
}

/// Validate every record and number survivors `1..=N`, positive first.
///
/// Invalid records are dropped and reported; they never abort the run.
/// Numbers emitted by the service are ignored.
pub fn classify(raw: &RawCategories) -> Result<Classification, CompileError> {
    let mut cases = Vec::new();
    let mut rejected = Vec::new();
    let mut next_sequence = 1u32;

    for category in Category::ALL {
        let records = raw.get(&category).map(Vec::as_slice).unwrap_or_default();
        for (index, record) in records.iter().enumerate() {
            match validate_record(category, index, record) {
                Ok(valid) => {
                    cases.push(TestCase::new(
                        next_sequence,
                        category,
                        valid.title,
                        valid.description,
                        valid.steps,
                        valid.expected_result,
                    ));
                    next_sequence += 1;
                }
                Err(err) => {
                    warn!(category = %category, index, error = %err, "dropping invalid test case record");
                    rejected.push(err);
                }
            }
        }
    }

    debug!(accepted = cases.len(), rejected = rejected.len(), "classification finished");
    Ok(Classification {
        suite: TestSuite::new(cases)?,
        rejected,
    })
}

fn validate_record(
    category: Category,
    index: usize,
    record: &Value,
) -> Result<ValidRecord, ValidationError> {
    let object = record
        .as_object()
        .ok_or(ValidationError::NotAnObject { category, index })?;

    let title = string_field(object, category, index, "name")?;
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle { category, index });
    }
    let description = string_field(object, category, index, "description")?;
    let expected_result = string_field(object, category, index, "expected_result")?;

    let steps = match object.get("steps") {
        None | Some(Value::Null) => {
            return Err(ValidationError::MissingField {
                category,
                index,
                field: "steps",
            })
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or(ValidationError::WrongType {
                category,
                index,
                field: "steps",
            })?,
        Some(_) => {
            return Err(ValidationError::WrongType {
                category,
                index,
                field: "steps",
            })
        }
    };

    Ok(ValidRecord {
        title: title.trim().to_string(),
        description,
        steps,
        expected_result,
    })
}

fn string_field(
    object: &Map<String, Value>,
    category: Category,
    index: usize,
    field: &'static str,
) -> Result<String, ValidationError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField {
            category,
            index,
            field,
        }),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(ValidationError::WrongType {
            category,
            index,
            field,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str) -> Value {
        json!({
            "name": name,
            "description": "d",
            "steps": ["a", "b"],
            "expected_result": "ok"
        })
    }

    #[test]
    fn numbering_runs_across_categories() {
        let mut raw = RawCategories::new();
        raw.insert(Category::Positive, vec![record("p1"), record("p2")]);
        raw.insert(Category::Negative, vec![record("n1")]);

        let classification = classify(&raw).unwrap();
        let numbered: Vec<(u32, Category)> = classification
            .suite
            .cases()
            .iter()
            .map(|case| (case.sequence(), case.category()))
            .collect();
        assert_eq!(
            numbered,
            vec![
                (1, Category::Positive),
                (2, Category::Positive),
                (3, Category::Negative)
            ]
        );
        assert!(classification.rejected.is_empty());
    }

    #[test]
    fn typed_rejections_are_reported() {
        let mut raw = RawCategories::new();
        raw.insert(
            Category::Positive,
            vec![
                json!("not an object"),
                json!({"name": "  ", "description": "", "steps": [], "expected_result": ""}),
                json!({"name": "x", "description": "", "steps": [1], "expected_result": ""}),
                json!({"name": "x", "description": "", "steps": []}),
            ],
        );
        let classification = classify(&raw).unwrap();
        assert!(classification.suite.is_empty());
        assert_eq!(
            classification.rejected,
            vec![
                ValidationError::NotAnObject {
                    category: Category::Positive,
                    index: 0
                },
                ValidationError::EmptyTitle {
                    category: Category::Positive,
                    index: 1
                },
                ValidationError::WrongType {
                    category: Category::Positive,
                    index: 2,
                    field: "steps"
                },
                ValidationError::MissingField {
                    category: Category::Positive,
                    index: 3,
                    field: "expected_result"
                },
            ]
        );
    }

    #[test]
    fn sequence_numbers_from_service_are_ignored() {
        let mut raw = RawCategories::new();
        let mut first = record("only");
        first["sequence"] = json!(7);
        raw.insert(Category::Negative, vec![first]);
        let suite = classify(&raw).unwrap().suite;
        assert_eq!(suite.cases()[0].sequence(), 1);
    }
}
