//! fleetplace-api — REST API for placement tasks.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/placements` | Submit a placement (200 when already terminal, else 202) |
//! | GET | `/api/v1/placements` | List placement tasks |
//! | GET | `/api/v1/placements/{id}` | Poll one task |
//! | PATCH | `/api/v1/placements/{id}` | Stage patch (409 on illegal transition) |
//! | POST | `/api/v1/placements/{id}/cancel` | Cancel a task |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use fleetplace_scheduler::PlacementService;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: PlacementService,
}

/// Build the API router.
pub fn build_router(service: PlacementService) -> Router {
    let api_state = ApiState { service };

    let api_routes = Router::new()
        .route(
            "/placements",
            get(handlers::list_placements).post(handlers::submit_placement),
        )
        .route(
            "/placements/{id}",
            get(handlers::get_placement).patch(handlers::patch_placement),
        )
        .route("/placements/{id}/cancel", post(handlers::cancel_placement))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
