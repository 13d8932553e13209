//! `/api` route table.
//!
//! Three tiers: public auth routes, routes for any signed-in user and an
//! admin tier nested inside the signed-in one.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    handlers::{
        admin, analytics, approvals, auth, exports, health, imports, inventory, quotations,
        requests,
    },
    middleware::{auth_middleware, require_admin},
    AppState,
};

pub fn create_api_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let authenticated = Router::new()
        .route("/health/detailed", get(health::detailed_health_check))
        .merge(auth_routes())
        .merge(request_routes())
        .merge(approval_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state, auth_middleware));

    public.merge(authenticated)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/change-password", put(auth::change_password))
}

fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/requests/lookups", get(requests::lookups))
        .route(
            "/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route(
            "/requests/:id",
            get(requests::get_request)
                .put(requests::update_request)
                .delete(requests::delete_request),
        )
        .route("/requests/:id/pdf", get(requests::download_pdf))
        .route("/requests/:id/attachments", post(requests::upload_attachment))
        .route(
            "/requests/:id/attachments/:attachment_id",
            get(requests::download_attachment),
        )
}

fn approval_routes() -> Router<AppState> {
    Router::new()
        .route("/approvals/pending", get(approvals::pending))
        .route("/approvals/:id/approve", post(approvals::approve))
        .route("/approvals/:id/reject", post(approvals::reject))
        .route("/approvals/:id/reschedule", post(approvals::reschedule))
        .route("/approvals/:id/history", get(approvals::history))
        .route("/approvals/:id/blanket-order", post(approvals::blanket_order))
        .route("/approvals/:id/proforma", post(approvals::proforma))
        .route("/approvals/:id/compliance", post(approvals::compliance))
}

/// Routes restricted to the `admin` role. Must sit behind `auth_middleware`.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/quotations", get(quotations::list_quotations))
        .route("/quotations/:id", put(quotations::update_quotation))
        .route("/imports/process", post(imports::process_import))
        .route("/imports/status/:job_id", get(imports::import_status))
        .route("/imports/history", get(imports::import_history))
        .route("/exports", get(exports::export_requests))
        .route("/exports/template", get(exports::download_template))
        .merge(analytics_routes())
        .merge(inventory_routes())
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/:id", put(admin::update_user))
        .route("/admin/users/:id/status", put(admin::set_user_status))
        .route("/admin/users/:id/password", put(admin::reset_password))
        .route("/admin/activity-logs", get(admin::activity_logs))
        .route("/admin/dashboard-stats", get(admin::dashboard_stats))
        .route("/admin/delete-all-data", delete(admin::delete_all_data))
        .route_layer(from_fn(require_admin))
}

fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/summary", get(analytics::summary))
        .route("/analytics/top-materials", get(analytics::top_materials))
        .route("/analytics/timeseries", get(analytics::time_series))
        .route("/analytics/search", get(analytics::search_materials))
        .route("/analytics/by-location", get(analytics::by_location))
        .route("/analytics/by-group", get(analytics::by_group))
        .route("/analytics/by-vendor", get(analytics::by_vendor))
        .route("/analytics/location/:location", get(analytics::location_detail))
}

fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/warehouses", get(inventory::list_warehouses))
        .route(
            "/inventory/receipts",
            get(inventory::list_receipts).post(inventory::create_receipt),
        )
        .route("/inventory/receipts/:id", get(inventory::get_receipt))
        .route(
            "/inventory/disbursements",
            get(inventory::list_disbursements).post(inventory::create_disbursement),
        )
        .route("/inventory/disbursements/:id", get(inventory::get_disbursement))
        .route("/inventory/stock", get(inventory::list_stock))
        .route("/inventory/stock/:id", put(inventory::update_stock))
        .route(
            "/inventory/surplus",
            get(inventory::list_surplus).post(inventory::create_surplus),
        )
        .route("/inventory/surplus/:id", put(inventory::update_surplus))
}
