//! Inventory Repository
//!
//! Warehouses, receipts, disbursements, the stock ledger and surplus.
//! Receipts add to stock and disbursements draw it down; a disbursement
//! that cannot be covered in full writes nothing.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use mrf_models::{
    ActivityAction, Disbursement, DisbursementDetail, DocumentFilter, DocumentLine,
    InventoryItem, InventoryStock, NewActivity, NewDisbursement, NewReceipt, NewSurplus,
    PageRequest, Paginated, ReceiptDetail, StockFilter, StockUpdate, SurplusFilter,
    SurplusRecord, SurplusUpdate, Warehouse, WarehouseDocument, WarehouseReceipt,
};
use mrf_utils::{MrfError, MrfResult};

use super::ActivityRepository;

const STOCK_SELECT: &str = r#"
    SELECT s.id, s.warehouse_id, w.name AS warehouse_name, s.material_description,
           s.oem_model, s.part_number, s.quantity_available, s.unit, s.reorder_level,
           s.shelf_location, s.remarks, s.updated_at
    FROM inventory_stock s
    JOIN warehouses w ON w.id = s.warehouse_id
"#;

pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn warehouses(&self) -> Result<Vec<Warehouse>> {
        sqlx::query_as::<_, Warehouse>(
            "SELECT * FROM warehouses WHERE is_active = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list warehouses")
    }

    pub async fn create_receipt(&self, input: &NewReceipt, user_id: Uuid) -> MrfResult<ReceiptDetail> {
        let mut tx = self.pool.begin().await?;

        ensure_warehouse(&mut tx, input.warehouse_id).await?;
        let number = next_document_number(&mut tx, WarehouseDocument::Receipt, input.receipt_date).await?;

        let receipt = sqlx::query_as::<_, WarehouseReceipt>(
            r#"
            INSERT INTO warehouse_receipts
                (receipt_number, warehouse_id, receipt_date, mrf_number, supplier,
                 received_by, remarks, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&number)
        .bind(input.warehouse_id)
        .bind(input.receipt_date)
        .bind(&input.mrf_number)
        .bind(&input.supplier)
        .bind(input.received_by.trim())
        .bind(&input.remarks)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let lines = insert_lines(&mut tx, "receipt_lines", receipt.id, &input.items).await?;

        for item in &input.items {
            sqlx::query(
                r#"
                INSERT INTO inventory_stock
                    (warehouse_id, material_description, oem_model, part_number,
                     quantity_available, unit)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (warehouse_id, material_description, oem_model, part_number)
                DO UPDATE SET
                    quantity_available = inventory_stock.quantity_available + EXCLUDED.quantity_available,
                    updated_at = NOW()
                "#,
            )
            .bind(input.warehouse_id)
            .bind(item.material_description.trim())
            .bind(item.oem_model.trim())
            .bind(item.part_number.trim())
            .bind(item.quantity)
            .bind(item.unit.trim())
            .execute(&mut *tx)
            .await?;
        }

        let activity = NewActivity::new(user_id, ActivityAction::ReceiptCreated)
            .on("warehouse_receipt", receipt.id)
            .details(format!("Receipt {} with {} item(s)", number, lines.len()));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await?;

        tracing::info!(receipt_number = %number, items = lines.len(), "Warehouse receipt recorded");
        Ok(ReceiptDetail { receipt, lines })
    }

    pub async fn create_disbursement(&self, input: &NewDisbursement, user_id: Uuid) -> MrfResult<DisbursementDetail> {
        let mut tx = self.pool.begin().await?;

        ensure_warehouse(&mut tx, input.warehouse_id).await?;

        for item in &input.items {
            let stock: Option<(Uuid, f64)> = sqlx::query_as(
                r#"
                SELECT id, quantity_available
                FROM inventory_stock
                WHERE warehouse_id = $1
                  AND material_description = $2
                  AND oem_model = $3
                  AND part_number = $4
                FOR UPDATE
                "#,
            )
            .bind(input.warehouse_id)
            .bind(item.material_description.trim())
            .bind(item.oem_model.trim())
            .bind(item.part_number.trim())
            .fetch_optional(&mut *tx)
            .await?;

            let stock_id = match stock {
                Some((id, available)) if available >= item.quantity => id,
                _ => {
                    tracing::warn!(
                        material = %item.material_description,
                        requested = item.quantity,
                        "Disbursement refused"
                    );
                    return Err(MrfError::InsufficientStock {
                        material: item.material_description.trim().to_string(),
                    });
                }
            };

            sqlx::query(
                r#"
                UPDATE inventory_stock
                SET quantity_available = quantity_available - $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(stock_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let number =
            next_document_number(&mut tx, WarehouseDocument::Disbursement, input.disbursement_date).await?;

        let disbursement = sqlx::query_as::<_, Disbursement>(
            r#"
            INSERT INTO disbursements
                (disbursement_number, warehouse_id, disbursement_date, mrf_number,
                 disbursed_by, received_by, purpose, remarks, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&number)
        .bind(input.warehouse_id)
        .bind(input.disbursement_date)
        .bind(&input.mrf_number)
        .bind(input.disbursed_by.trim())
        .bind(input.received_by.trim())
        .bind(&input.purpose)
        .bind(&input.remarks)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let lines = insert_lines(&mut tx, "disbursement_lines", disbursement.id, &input.items).await?;

        let activity = NewActivity::new(user_id, ActivityAction::DisbursementCreated)
            .on("disbursement", disbursement.id)
            .details(format!("Disbursement {} with {} item(s)", number, lines.len()));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await?;

        tracing::info!(disbursement_number = %number, items = lines.len(), "Disbursement recorded");
        Ok(DisbursementDetail { disbursement, lines })
    }

    pub async fn list_receipts(&self, filter: &DocumentFilter) -> Result<Paginated<WarehouseReceipt>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(25));

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM warehouse_receipts WHERE 1=1");
        push_document_filters(&mut count, "receipt_date", filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count receipts")?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM warehouse_receipts WHERE 1=1");
        push_document_filters(&mut query, "receipt_date", filter);
        query
            .push(" ORDER BY receipt_date DESC, receipt_number DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<WarehouseReceipt>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list receipts")?;

        Ok(Paginated::new(rows, page, total))
    }

    pub async fn receipt(&self, id: Uuid) -> Result<Option<ReceiptDetail>> {
        let receipt = sqlx::query_as::<_, WarehouseReceipt>("SELECT * FROM warehouse_receipts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch receipt")?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };
        let lines = self.document_lines("receipt_lines", id).await?;
        Ok(Some(ReceiptDetail { receipt, lines }))
    }

    pub async fn list_disbursements(&self, filter: &DocumentFilter) -> Result<Paginated<Disbursement>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(25));

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM disbursements WHERE 1=1");
        push_document_filters(&mut count, "disbursement_date", filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count disbursements")?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM disbursements WHERE 1=1");
        push_document_filters(&mut query, "disbursement_date", filter);
        query
            .push(" ORDER BY disbursement_date DESC, disbursement_number DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<Disbursement>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list disbursements")?;

        Ok(Paginated::new(rows, page, total))
    }

    pub async fn disbursement(&self, id: Uuid) -> Result<Option<DisbursementDetail>> {
        let disbursement = sqlx::query_as::<_, Disbursement>("SELECT * FROM disbursements WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch disbursement")?;

        let Some(disbursement) = disbursement else {
            return Ok(None);
        };
        let lines = self.document_lines("disbursement_lines", id).await?;
        Ok(Some(DisbursementDetail { disbursement, lines }))
    }

    async fn document_lines(&self, table: &'static str, document_id: Uuid) -> Result<Vec<DocumentLine>> {
        sqlx::query_as::<_, DocumentLine>(&format!(
            "SELECT * FROM {} WHERE document_id = $1 ORDER BY line_no",
            table
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch {}", table))
    }

    pub async fn stock(&self, filter: &StockFilter) -> Result<Paginated<InventoryStock>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(50));

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM inventory_stock s JOIN warehouses w ON w.id = s.warehouse_id WHERE 1=1",
        );
        push_stock_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count stock")?;

        let mut query = QueryBuilder::<Postgres>::new(STOCK_SELECT);
        query.push(" WHERE 1=1");
        push_stock_filters(&mut query, filter);
        query
            .push(" ORDER BY w.name, s.material_description LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<InventoryStock>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list stock")?;

        Ok(Paginated::new(rows, page, total))
    }

    pub async fn update_stock(&self, id: Uuid, update: &StockUpdate) -> Result<Option<InventoryStock>> {
        let updated = sqlx::query(
            r#"
            UPDATE inventory_stock SET
                reorder_level = COALESCE($2, reorder_level),
                shelf_location = COALESCE($3, shelf_location),
                remarks = COALESCE($4, remarks),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.reorder_level)
        .bind(&update.shelf_location)
        .bind(&update.remarks)
        .execute(&self.pool)
        .await
        .context("Failed to update stock")?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query_as::<_, InventoryStock>(&format!("{} WHERE s.id = $1", STOCK_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch stock")
    }

    pub async fn create_surplus(&self, input: &NewSurplus) -> MrfResult<SurplusRecord> {
        let mut tx = self.pool.begin().await?;
        ensure_warehouse(&mut tx, input.warehouse_id).await?;

        let record = sqlx::query_as::<_, SurplusRecord>(
            r#"
            INSERT INTO surplus_records
                (warehouse_id, material_description, oem_model, part_number, quantity,
                 unit, condition, disposition, reported_by, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.warehouse_id)
        .bind(input.material_description.trim())
        .bind(input.oem_model.trim())
        .bind(input.part_number.trim())
        .bind(input.quantity)
        .bind(input.unit.trim())
        .bind(&input.condition)
        .bind(input.disposition())
        .bind(input.reported_by.trim())
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    pub async fn list_surplus(&self, filter: &SurplusFilter) -> Result<Vec<SurplusRecord>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM surplus_records WHERE 1=1");
        if let Some(warehouse_id) = filter.warehouse_id {
            query.push(" AND warehouse_id = ").push_bind(warehouse_id);
        }
        if let Some(disposition) = filter.disposition.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            query.push(" AND disposition ILIKE ").push_bind(disposition.to_string());
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            query
                .push(" AND (material_description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR part_number ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        query.push(" ORDER BY created_at DESC");

        query
            .build_query_as::<SurplusRecord>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list surplus")
    }

    pub async fn update_surplus(&self, id: Uuid, update: &SurplusUpdate) -> Result<Option<SurplusRecord>> {
        sqlx::query_as::<_, SurplusRecord>(
            r#"
            UPDATE surplus_records SET
                disposition = COALESCE($2, disposition),
                quantity = COALESCE($3, quantity),
                remarks = COALESCE($4, remarks),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.disposition.as_deref().map(str::trim).filter(|d| !d.is_empty()))
        .bind(update.quantity)
        .bind(&update.remarks)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update surplus")
    }
}

async fn ensure_warehouse(conn: &mut PgConnection, warehouse_id: Uuid) -> MrfResult<()> {
    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM warehouses WHERE id = $1")
        .bind(warehouse_id)
        .fetch_optional(&mut *conn)
        .await?;

    match active {
        Some(true) => Ok(()),
        _ => Err(MrfError::not_found("Warehouse")),
    }
}

/// Day-scoped running number. The advisory lock serialises writers of the
/// same document kind and date until the transaction ends.
async fn next_document_number(
    conn: &mut PgConnection,
    kind: WarehouseDocument,
    date: NaiveDate,
) -> MrfResult<String> {
    let (table, date_column) = match kind {
        WarehouseDocument::Receipt => ("warehouse_receipts", "receipt_date"),
        WarehouseDocument::Disbursement => ("disbursements", "disbursement_date"),
    };

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(kind.number(date, 0))
        .execute(&mut *conn)
        .await?;

    let existing: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE {} = $1",
        table, date_column
    ))
    .bind(date)
    .fetch_one(&mut *conn)
    .await?;

    Ok(kind.number(date, existing + 1))
}

async fn insert_lines(
    conn: &mut PgConnection,
    table: &'static str,
    document_id: Uuid,
    items: &[InventoryItem],
) -> MrfResult<Vec<DocumentLine>> {
    let sql = format!(
        r#"
        INSERT INTO {}
            (document_id, line_no, material_description, oem_model, part_number, quantity, unit)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
        table
    );

    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let line = sqlx::query_as::<_, DocumentLine>(&sql)
            .bind(document_id)
            .bind(index as i32 + 1)
            .bind(item.material_description.trim())
            .bind(item.oem_model.trim())
            .bind(item.part_number.trim())
            .bind(item.quantity)
            .bind(item.unit.trim())
            .fetch_one(&mut *conn)
            .await?;
        lines.push(line);
    }
    Ok(lines)
}

fn push_document_filters(query: &mut QueryBuilder<'_, Postgres>, date_column: &str, filter: &DocumentFilter) {
    if let Some(warehouse_id) = filter.warehouse_id {
        query.push(" AND warehouse_id = ").push_bind(warehouse_id);
    }
    if let Some(from) = filter.from {
        query.push(format!(" AND {} >= ", date_column)).push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(format!(" AND {} <= ", date_column)).push_bind(to);
    }
}

fn push_stock_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &StockFilter) {
    if let Some(warehouse_id) = filter.warehouse_id {
        query.push(" AND s.warehouse_id = ").push_bind(warehouse_id);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query
            .push(" AND (s.material_description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.oem_model ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.part_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if filter.low_stock_only {
        query.push(" AND s.quantity_available <= s.reorder_level");
    }
}
