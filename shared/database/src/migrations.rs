use anyhow::{Context, Result};
use sqlx::PgPool;

/// Idempotent schema, applied in order on every start.
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email VARCHAR NOT NULL UNIQUE,
            password_hash VARCHAR NOT NULL,
            first_name VARCHAR NOT NULL,
            last_name VARCHAR NOT NULL,
            user_code VARCHAR,
            designation VARCHAR,
            department VARCHAR,
            location VARCHAR,
            role VARCHAR NOT NULL DEFAULT 'worker'
                CHECK (role IN ('worker', 'manager', 'admin')),
            approval_level SMALLINT NOT NULL DEFAULT 0
                CHECK (approval_level BETWEEN 0 AND 4),
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            last_login TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "sessions",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash VARCHAR NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "import_jobs",
        r#"
        CREATE TABLE IF NOT EXISTS import_jobs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            file_name VARCHAR NOT NULL,
            imported_by UUID REFERENCES users(id) ON DELETE SET NULL,
            status VARCHAR NOT NULL DEFAULT 'processing',
            duplicate_strategy VARCHAR NOT NULL DEFAULT 'skip',
            mapping_used JSONB NOT NULL DEFAULT '{}',
            total_rows INTEGER NOT NULL DEFAULT 0,
            successful_rows INTEGER NOT NULL DEFAULT 0,
            failed_rows INTEGER NOT NULL DEFAULT 0,
            error_log JSONB NOT NULL DEFAULT '[]',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            completed_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "material_requests",
        r#"
        CREATE TABLE IF NOT EXISTS material_requests (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            mrf_number VARCHAR NOT NULL UNIQUE,
            request_date DATE NOT NULL DEFAULT CURRENT_DATE,
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            first_name VARCHAR NOT NULL,
            last_name VARCHAR NOT NULL,
            user_code VARCHAR NOT NULL,
            designation VARCHAR NOT NULL,
            office_extension VARCHAR NOT NULL DEFAULT '',
            asset VARCHAR NOT NULL,
            unit_tag VARCHAR NOT NULL DEFAULT '',
            discipline VARCHAR NOT NULL,
            material_category VARCHAR NOT NULL DEFAULT '',
            criticality VARCHAR NOT NULL DEFAULT 'Medium',
            work_order_no VARCHAR NOT NULL DEFAULT '',
            work_order_type VARCHAR NOT NULL DEFAULT '',
            reason TEXT NOT NULL,
            service_material VARCHAR NOT NULL DEFAULT 'Material',
            remarks TEXT,
            status VARCHAR NOT NULL DEFAULT 'Pending',
            status_notes TEXT,
            internal_reference VARCHAR,
            action_pending VARCHAR,
            vendor_name VARCHAR,
            blanket_order_number VARCHAR,
            call_off_number VARCHAR,
            purchase_order_no VARCHAR,
            quotation_reference VARCHAR,
            quotation_status VARCHAR NOT NULL DEFAULT 'Not Submitted',
            quotation_approval_date DATE,
            quotation_amount_usd DOUBLE PRECISION,
            quotation_amount_eur DOUBLE PRECISION,
            quotation_amount_ngn DOUBLE PRECISION,
            estimated_delivery_date DATE,
            actual_delivery_date DATE,
            notes TEXT,
            other TEXT,
            workflow_stage VARCHAR NOT NULL DEFAULT 'MRF_CREATED',
            approved_by_supervisor UUID REFERENCES users(id) ON DELETE SET NULL,
            approved_date_supervisor TIMESTAMPTZ,
            supervisor_comments TEXT,
            approved_by_manager UUID REFERENCES users(id) ON DELETE SET NULL,
            approved_date_manager TIMESTAMPTZ,
            manager_comments TEXT,
            approved_by_area_manager UUID REFERENCES users(id) ON DELETE SET NULL,
            approved_date_area_manager TIMESTAMPTZ,
            area_manager_comments TEXT,
            has_blanket_order BOOLEAN NOT NULL DEFAULT FALSE,
            blanket_order_ref VARCHAR,
            proforma_ref VARCHAR,
            proforma_amount_usd DOUBLE PRECISION,
            proforma_amount_ngn DOUBLE PRECISION,
            proforma_date DATE,
            compliance_status VARCHAR,
            compliance_notes TEXT,
            rejection_reason TEXT,
            rejection_stage VARCHAR,
            rescheduled_date DATE,
            reschedule_reason TEXT,
            import_job_id UUID REFERENCES import_jobs(id) ON DELETE SET NULL,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "material_request_lines",
        r#"
        CREATE TABLE IF NOT EXISTS material_request_lines (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            request_id UUID NOT NULL REFERENCES material_requests(id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            material_description TEXT NOT NULL,
            oem_model VARCHAR NOT NULL DEFAULT '',
            part_number VARCHAR NOT NULL DEFAULT '',
            quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
            quantity_unit VARCHAR NOT NULL DEFAULT 'pcs',
            received_quantity DOUBLE PRECISION NOT NULL DEFAULT 0,
            UNIQUE (request_id, line_no)
        )
        "#,
    ),
    (
        "approval_history",
        r#"
        CREATE TABLE IF NOT EXISTS approval_history (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            request_id UUID NOT NULL REFERENCES material_requests(id) ON DELETE CASCADE,
            from_stage VARCHAR NOT NULL,
            to_stage VARCHAR NOT NULL,
            action VARCHAR NOT NULL,
            approved_by UUID REFERENCES users(id) ON DELETE SET NULL,
            approver_name VARCHAR,
            approver_role VARCHAR,
            comments TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "attachments",
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            request_id UUID NOT NULL REFERENCES material_requests(id) ON DELETE CASCADE,
            file_name VARCHAR NOT NULL,
            stored_name VARCHAR NOT NULL,
            content_type VARCHAR NOT NULL,
            file_size BIGINT NOT NULL,
            category VARCHAR NOT NULL DEFAULT 'general',
            status VARCHAR NOT NULL DEFAULT 'uploaded',
            vendor_name VARCHAR,
            quotation_reference VARCHAR,
            quotation_amount DOUBLE PRECISION,
            currency VARCHAR,
            notes TEXT,
            uploaded_by UUID REFERENCES users(id) ON DELETE SET NULL,
            approved_by UUID REFERENCES users(id) ON DELETE SET NULL,
            approved_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "warehouses",
        r#"
        CREATE TABLE IF NOT EXISTS warehouses (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            code VARCHAR NOT NULL UNIQUE,
            name VARCHAR NOT NULL,
            location VARCHAR,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "inventory_stock",
        r#"
        CREATE TABLE IF NOT EXISTS inventory_stock (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            material_description TEXT NOT NULL,
            oem_model VARCHAR NOT NULL DEFAULT '',
            part_number VARCHAR NOT NULL DEFAULT '',
            quantity_available DOUBLE PRECISION NOT NULL DEFAULT 0
                CHECK (quantity_available >= 0),
            unit VARCHAR NOT NULL DEFAULT 'pcs',
            reorder_level DOUBLE PRECISION NOT NULL DEFAULT 0,
            shelf_location VARCHAR,
            remarks TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (warehouse_id, material_description, oem_model, part_number)
        )
        "#,
    ),
    (
        "warehouse_receipts",
        r#"
        CREATE TABLE IF NOT EXISTS warehouse_receipts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            receipt_number VARCHAR NOT NULL UNIQUE,
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            receipt_date DATE NOT NULL,
            mrf_number VARCHAR,
            supplier VARCHAR,
            received_by VARCHAR NOT NULL,
            remarks TEXT,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "receipt_lines",
        r#"
        CREATE TABLE IF NOT EXISTS receipt_lines (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            document_id UUID NOT NULL REFERENCES warehouse_receipts(id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            material_description TEXT NOT NULL,
            oem_model VARCHAR NOT NULL DEFAULT '',
            part_number VARCHAR NOT NULL DEFAULT '',
            quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
            unit VARCHAR NOT NULL DEFAULT 'pcs'
        )
        "#,
    ),
    (
        "disbursements",
        r#"
        CREATE TABLE IF NOT EXISTS disbursements (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            disbursement_number VARCHAR NOT NULL UNIQUE,
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            disbursement_date DATE NOT NULL,
            mrf_number VARCHAR,
            disbursed_by VARCHAR NOT NULL,
            received_by VARCHAR NOT NULL,
            purpose TEXT,
            remarks TEXT,
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "disbursement_lines",
        r#"
        CREATE TABLE IF NOT EXISTS disbursement_lines (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            document_id UUID NOT NULL REFERENCES disbursements(id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            material_description TEXT NOT NULL,
            oem_model VARCHAR NOT NULL DEFAULT '',
            part_number VARCHAR NOT NULL DEFAULT '',
            quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
            unit VARCHAR NOT NULL DEFAULT 'pcs'
        )
        "#,
    ),
    (
        "surplus_records",
        r#"
        CREATE TABLE IF NOT EXISTS surplus_records (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            warehouse_id UUID NOT NULL REFERENCES warehouses(id),
            material_description TEXT NOT NULL,
            oem_model VARCHAR NOT NULL DEFAULT '',
            part_number VARCHAR NOT NULL DEFAULT '',
            quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
            unit VARCHAR NOT NULL DEFAULT 'pcs',
            condition VARCHAR,
            disposition VARCHAR NOT NULL DEFAULT 'Available',
            reported_by VARCHAR NOT NULL,
            remarks TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "activity_logs",
        r#"
        CREATE TABLE IF NOT EXISTS activity_logs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            action VARCHAR NOT NULL,
            entity_type VARCHAR,
            entity_id UUID,
            details TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_requests_request_date ON material_requests(request_date)",
    "CREATE INDEX IF NOT EXISTS idx_requests_workflow_stage ON material_requests(workflow_stage)",
    "CREATE INDEX IF NOT EXISTS idx_requests_status ON material_requests(status)",
    "CREATE INDEX IF NOT EXISTS idx_requests_user_id ON material_requests(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_request_lines_request_id ON material_request_lines(request_id)",
    "CREATE INDEX IF NOT EXISTS idx_approval_history_request_id ON approval_history(request_id)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_request_id ON attachments(request_id)",
    "CREATE INDEX IF NOT EXISTS idx_attachments_category_status ON attachments(category, status)",
    "CREATE INDEX IF NOT EXISTS idx_receipt_lines_document_id ON receipt_lines(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_disbursement_lines_document_id ON disbursement_lines(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_activity_logs_created_at ON activity_logs(created_at)",
];

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    for (table, ddl) in TABLES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create index: {}", ddl))?;
    }

    // One warehouse per site
    sqlx::query(
        r#"
        INSERT INTO warehouses (code, name, location)
        VALUES ('LAR-WH', 'Land Area Warehouse', 'Land Area'),
               ('SAR-WH', 'Swamp Area Warehouse', 'Swamp Area'),
               ('PHC-WH', 'PHC POD Warehouse', 'Port Harcourt')
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to seed warehouses")?;

    tracing::info!(tables = TABLES.len(), "PostgreSQL migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_idempotent() {
        for (table, ddl) in TABLES {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "{} must be created idempotently",
                table
            );
        }
        assert!(INDEXES.iter().all(|ddl| ddl.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_referenced_tables_are_created_first() {
        let position = |name: &str| TABLES.iter().position(|(t, _)| *t == name).unwrap();
        for (index, (_, ddl)) in TABLES.iter().enumerate() {
            for (other, _) in TABLES {
                if ddl.contains(&format!("REFERENCES {}(", other)) {
                    assert!(position(other) < index, "{} referenced before creation", other);
                }
            }
        }
    }
}
