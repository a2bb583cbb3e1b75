use crate::error::RegistryError;
use axum::{
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `axum::Json` with body rejections reported as `RegistryError` (400, JSON).
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(RegistryError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
