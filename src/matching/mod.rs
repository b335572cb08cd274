//! Driver matching for company searches.

pub mod query;

pub use query::{MatchQuery, SqlParam};

use crate::error::DatabaseError;
use crate::form::CompanyFilter;
use crate::store::{Database, DriverRecord};

/// Outcome of asking for the next driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Browse {
    /// `remaining` counts unseen matches including `driver`.
    Found { driver: DriverRecord, remaining: i64 },
    /// Every match has been seen.
    Exhausted,
    /// Nothing matches the filters at all.
    NoMatches,
}

/// Next unseen driver for `filter`.
pub async fn next_match(
    db: &dyn Database,
    filter: &CompanyFilter,
    excluded: &[i64],
) -> Result<Browse, DatabaseError> {
    let Some(driver) = db.find_next_match(filter, excluded).await? else {
        return Ok(if excluded.is_empty() {
            Browse::NoMatches
        } else {
            Browse::Exhausted
        });
    };
    let remaining = db.count_matches(filter, excluded).await?;
    Ok(Browse::Found { driver, remaining })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::form::DriverProfile;
    use crate::store::{LibSqlBackend, NewDriver};

    async fn driver(db: &LibSqlBackend, user_id: i64, cars: &[&str]) -> i64 {
        db.create_driver(&NewDriver {
            user_id,
            lang: "en".into(),
            profile: DriverProfile {
                car_types: Some(cars.iter().map(|c| c.to_string()).collect()),
                ..Default::default()
            },
            price: dec!(100),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn browsing_walks_then_exhausts() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let a = driver(&db, 1, &["B", "C"]).await;
        let b = driver(&db, 2, &["B"]).await;
        let filter = CompanyFilter::default();

        let Browse::Found { driver: first, remaining } = next_match(&db, &filter, &[]).await.unwrap()
        else {
            panic!("expected a match");
        };
        assert_eq!(first.id, a);
        assert_eq!(remaining, 2);

        let Browse::Found { driver: second, remaining } =
            next_match(&db, &filter, &[a]).await.unwrap()
        else {
            panic!("expected a match");
        };
        assert_eq!(second.id, b);
        assert_eq!(remaining, 1);

        assert_eq!(next_match(&db, &filter, &[a, b]).await.unwrap(), Browse::Exhausted);
    }

    #[tokio::test]
    async fn containment_requires_every_code() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let both = driver(&db, 1, &["B", "C"]).await;
        driver(&db, 2, &["B"]).await;
        let filter = CompanyFilter {
            car_types: Some(vec!["B".into(), "C".into()]),
            ..Default::default()
        };

        match next_match(&db, &filter, &[]).await.unwrap() {
            Browse::Found { driver, remaining } => {
                assert_eq!(driver.id, both);
                assert_eq!(remaining, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        let strict = CompanyFilter {
            car_types: Some(vec!["CE".into()]),
            ..Default::default()
        };
        assert_eq!(next_match(&db, &strict, &[]).await.unwrap(), Browse::NoMatches);
    }
}
