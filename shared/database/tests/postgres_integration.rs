//! Repository tests against a live PostgreSQL.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p mrf-database -- --ignored`.
//! Every test works on freshly created rows so the suite can share a database.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use mrf_database::{
    create_postgres_pool, migrations::run_postgres_migrations, ImportRepository,
    InventoryRepository, PostgresPool, RequestRepository, UserRepository, WorkflowRepository,
};
use mrf_models::{
    ApprovalAction, ApprovalDecision, DuplicateStrategy, ImportedLine, ImportedRequest,
    InventoryItem, NewDisbursement, NewMaterialRequest, NewReceipt, NewRequestLine,
    RegisterUser, RequestStatus, SiteCode, User, UserRole, WorkflowStage,
};
use mrf_utils::MrfError;

async fn pool() -> PostgresPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_postgres_pool(&url, 5, std::time::Duration::from_secs(10))
        .await
        .expect("connect");
    run_postgres_migrations(&pool).await.expect("migrate");
    pool
}

async fn user(pool: &PostgresPool, level: i16) -> User {
    let profile = RegisterUser {
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        password: "secret1".into(),
        first_name: "Test".into(),
        last_name: format!("Level{}", level),
        user_code: None,
        designation: None,
        department: None,
        location: None,
    };
    UserRepository::new(pool.clone())
        .create(&profile, "salt$hash", UserRole::Manager, level)
        .await
        .expect("create user")
}

fn new_request(area: &str) -> NewMaterialRequest {
    NewMaterialRequest {
        area: Some(area.into()),
        request_date: NaiveDate::from_ymd_opt(2019, 5, 4),
        first_name: "Ada".into(),
        last_name: "Obi".into(),
        user_code: "EMP-1".into(),
        designation: "Technician".into(),
        asset: "OBOB".into(),
        discipline: "MECHANICAL".into(),
        reason: "Seal replacement".into(),
        lines: vec![NewRequestLine {
            material_description: "Mechanical seal".into(),
            quantity: Some(2.0),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[tokio::test]
#[ignore]
async fn test_generated_numbers_are_sequential_per_site() {
    let pool = pool().await;
    let requester = user(&pool, 0).await;
    let repo = RequestRepository::new(pool.clone());

    let first = repo.create(&new_request("Swamp Area"), &requester).await.unwrap();
    let second = repo.create(&new_request("Swamp Area"), &requester).await.unwrap();

    // Backdated requests still draw from this year's sequence.
    let year = chrono::Utc::now().year();
    let a = SiteCode::Sar.parse_sequence(&first.request.mrf_number, year).unwrap();
    let b = SiteCode::Sar.parse_sequence(&second.request.mrf_number, year).unwrap();
    assert_eq!(b, a + 1);
    assert_eq!(first.request.request_date, NaiveDate::from_ymd_opt(2019, 5, 4).unwrap());
    assert_eq!(first.lines.len(), 1);
    assert_eq!(first.lines[0].line_no, 1);
}

#[tokio::test]
#[ignore]
async fn test_approval_chain_and_rejection() {
    let pool = pool().await;
    let requester = user(&pool, 0).await;
    let supervisor = user(&pool, 1).await;
    let area_manager = user(&pool, 3).await;

    let created = RequestRepository::new(pool.clone())
        .create(&new_request("PHC POD"), &requester)
        .await
        .unwrap();
    let id = created.request.id;
    let workflow = WorkflowRepository::new(pool.clone());

    let approved = workflow
        .approve(id, &supervisor, &ApprovalDecision::default())
        .await
        .unwrap();
    assert_eq!(approved.workflow_stage, WorkflowStage::MrfApproved);
    assert_eq!(approved.approved_by_supervisor, Some(supervisor.id));

    let rejected = workflow
        .reject(id, &area_manager, "Budget exhausted this quarter")
        .await
        .unwrap();
    assert_eq!(rejected.workflow_stage, WorkflowStage::Rejected);
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.rejection_stage.as_deref(), Some("MRF_APPROVED"));

    let history = workflow.history(id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action, ApprovalAction::Rejected);
    assert_eq!(history[0].approver_role.as_deref(), Some("Supervisor"));

    let err = workflow
        .approve(id, &area_manager, &ApprovalDecision::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MrfError::Workflow { .. }));
}

#[tokio::test]
#[ignore]
async fn test_import_skip_duplicate_logs_one_error() {
    let pool = pool().await;
    let admin = user(&pool, 4).await;
    let repo = ImportRepository::new(pool.clone());
    let mrf_number = format!("LAR-IMP-{}", Uuid::new_v4().simple());

    let imported = ImportedRequest {
        mrf_number: mrf_number.clone(),
        request_date: NaiveDate::from_ymd_opt(2031, 1, 2).unwrap(),
        asset: "KWALE".into(),
        reason: "Imported".into(),
        service_material: "Gasket".into(),
        discipline: "MECHANICAL".into(),
        status_notes: None,
        call_off_number: None,
        remarks: None,
        lines: vec![ImportedLine {
            material_description: "Gasket".into(),
            quantity: 1.0,
            quantity_unit: "pcs".into(),
        }],
        source_row: 2,
    };

    let job = repo
        .create_job("first.csv", admin.id, DuplicateStrategy::Skip, &serde_json::json!({}))
        .await
        .unwrap();
    let first = repo
        .import_requests(&job, admin.id, &[imported.clone()], DuplicateStrategy::Skip, vec![], 1)
        .await
        .unwrap();
    assert_eq!(first.successful, 1);

    let job = repo
        .create_job("second.csv", admin.id, DuplicateStrategy::Skip, &serde_json::json!({}))
        .await
        .unwrap();
    let second = repo
        .import_requests(&job, admin.id, &[imported], DuplicateStrategy::Skip, vec![], 1)
        .await
        .unwrap();
    assert_eq!(second.successful, 0);
    assert_eq!(second.failed, 1);
    assert_eq!(second.errors[0].error, "Duplicate (skipped)");

    let stored = repo.job(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "completed");
    assert_eq!(stored.failed_rows, 1);
}

#[tokio::test]
#[ignore]
async fn test_disbursement_cannot_overdraw_stock() {
    let pool = pool().await;
    let admin = user(&pool, 4).await;
    let repo = InventoryRepository::new(pool.clone());
    let warehouse = repo.warehouses().await.unwrap().remove(0);
    let material = format!("Valve {}", Uuid::new_v4().simple());
    let date = NaiveDate::from_ymd_opt(2031, 2, 3).unwrap();

    let item = |quantity: f64| InventoryItem {
        material_description: material.clone(),
        oem_model: String::new(),
        part_number: String::new(),
        quantity,
        unit: "pcs".into(),
    };

    let receipt = repo
        .create_receipt(
            &NewReceipt {
                warehouse_id: warehouse.id,
                receipt_date: date,
                mrf_number: None,
                supplier: None,
                received_by: "Store".into(),
                remarks: None,
                items: vec![item(5.0)],
            },
            admin.id,
        )
        .await
        .unwrap();
    assert!(receipt.receipt.receipt_number.starts_with("WR-20310203-"));

    let disbursement = |quantity: f64| NewDisbursement {
        warehouse_id: warehouse.id,
        disbursement_date: date,
        mrf_number: None,
        disbursed_by: "Store".into(),
        received_by: "Crew".into(),
        purpose: None,
        remarks: None,
        items: vec![item(quantity)],
    };

    let err = repo.create_disbursement(&disbursement(6.0), admin.id).await.unwrap_err();
    assert!(matches!(err, MrfError::InsufficientStock { .. }));

    repo.create_disbursement(&disbursement(5.0), admin.id).await.unwrap();
    let err = repo.create_disbursement(&disbursement(1.0), admin.id).await.unwrap_err();
    assert_eq!(err.http_status_code(), 409);
}
