//! PostgreSQL-backed checks for the Diesel store and repository.
//!
//! Set `DISBURSEMENT_TEST_DATABASE_URL` to a disposable database to run
//! them; otherwise each test reports `SKIP-TEST-CLUSTER` and returns.

use std::sync::Arc;

use diesel::sql_types::{BigInt, Uuid as SqlUuid};
use diesel::{QueryableByName, sql_query};
use diesel_async::RunQueryDsl;
use rstest::rstest;
use uuid::Uuid;

use disbursement::domain::ports::DisbursementRepository;
use disbursement::domain::{
    Cause, Context, Disbursement, ErrorCode, ErrorKind, HandledError, TransactionManager,
};
use disbursement::outbound::persistence::{
    DbPool, DieselDisbursementRepository, DieselStore, PoolConfig, run_migrations,
};

const DATABASE_URL_ENV: &str = "DISBURSEMENT_TEST_DATABASE_URL";

#[derive(QueryableByName)]
struct RowCount {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

struct Database {
    pool: DbPool,
    manager: TransactionManager,
    repository: DieselDisbursementRepository,
}

impl Database {
    async fn count(&self, id: Uuid) -> i64 {
        let mut conn = self.pool.get().await.expect("connection");
        sql_query("SELECT COUNT(*) AS count FROM disbursements WHERE id = $1")
            .bind::<SqlUuid, _>(id)
            .get_result::<RowCount>(&mut *conn)
            .await
            .expect("count query")
            .count
    }
}

async fn database() -> Option<Database> {
    let Ok(url) = std::env::var(DATABASE_URL_ENV) else {
        eprintln!("SKIP-TEST-CLUSTER: set {DATABASE_URL_ENV} to run");
        return None;
    };
    let migrate_url = url.clone();
    tokio::task::spawn_blocking(move || run_migrations(&migrate_url))
        .await
        .expect("migration task joins")
        .expect("migrations apply");
    let pool = DbPool::new(PoolConfig::new(url).with_max_size(2))
        .await
        .expect("pool builds");
    Some(Database {
        manager: TransactionManager::new(Arc::new(DieselStore::new(pool.clone()))),
        repository: DieselDisbursementRepository::new(pool.clone()),
        pool,
    })
}

fn disbursement(amount: f64) -> Disbursement {
    Disbursement::with_id(Uuid::new_v4(), amount).expect("valid amount")
}

#[rstest]
#[tokio::test]
async fn committed_work_is_visible() {
    let Some(db) = database().await else {
        return;
    };
    let row = disbursement(12.5);
    let id = row.id();

    db.manager
        .run_in_transaction(&Context::background(), |ctx| {
            let repository = db.repository.clone();
            async move {
                repository
                    .create_disbursement(&ctx, &row)
                    .await
                    .map_err(HandledError::from)
            }
        })
        .await
        .expect("transaction commits");

    assert_eq!(db.count(id).await, 1);
}

#[rstest]
#[tokio::test]
async fn failed_work_is_rolled_back() {
    let Some(db) = database().await else {
        return;
    };
    let row = disbursement(7.0);
    let id = row.id();

    let err = db
        .manager
        .run_in_transaction(&Context::background(), |ctx| {
            let repository = db.repository.clone();
            async move {
                repository
                    .create_disbursement(&ctx, &row)
                    .await
                    .map_err(HandledError::from)?;
                Err::<(), _>(HandledError::unprocessable_entity(
                    Cause::message("limit exceeded"),
                    "limit exceeded",
                    ErrorCode::INVALID_REQUEST,
                    Vec::new(),
                ))
            }
        })
        .await
        .expect_err("unit of work fails");

    assert_eq!(err.kind(), ErrorKind::UnprocessableEntity);
    assert_eq!(db.count(id).await, 0);
}

#[rstest]
#[tokio::test]
async fn nested_work_shares_the_outer_transaction() {
    let Some(db) = database().await else {
        return;
    };
    let outer = disbursement(1.0);
    let inner = disbursement(2.0);
    let ids = [outer.id(), inner.id()];
    let manager = db.manager.clone();

    let err = db
        .manager
        .run_in_transaction(&Context::background(), |ctx| {
            let repository = db.repository.clone();
            async move {
                repository
                    .create_disbursement(&ctx, &outer)
                    .await
                    .map_err(HandledError::from)?;
                manager
                    .run_in_transaction(&ctx, |nested| async move {
                        repository
                            .create_disbursement(&nested, &inner)
                            .await
                            .map_err(HandledError::from)
                    })
                    .await?;
                Err::<(), _>(HandledError::classify(
                    Cause::message("abort after nested work"),
                    "abort after nested work",
                    ErrorCode::INTERNAL_ERROR,
                ))
            }
        })
        .await
        .expect_err("outer unit fails");

    assert_eq!(err.kind(), ErrorKind::Unknown);
    for id in ids {
        assert_eq!(db.count(id).await, 0);
    }
}

#[rstest]
#[tokio::test]
async fn non_positive_amounts_are_rejected_by_the_table() {
    let Some(db) = database().await else {
        return;
    };

    let mut conn = db.pool.get().await.expect("connection");
    let result = sql_query("INSERT INTO disbursements (id, amount) VALUES ($1, 0)")
        .bind::<SqlUuid, _>(Uuid::new_v4())
        .execute(&mut *conn)
        .await;

    assert!(result.is_err(), "check constraint rejects zero");
}
