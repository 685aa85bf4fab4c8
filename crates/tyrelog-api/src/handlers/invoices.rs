use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tyrelog_core::AppError;

use super::form::{bytes_field, content_type_for, parse_visit_date, required, text_field};
use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreInvoiceResponse {
    pub invoice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceQuery {
    pub reg_number: String,
    pub date: String,
    pub invoice_name: String,
}

#[tracing::instrument(skip(state, multipart), fields(operation = "store_invoice"))]
pub async fn store_invoice(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut reg_number = None;
    let mut date = None;
    let mut invoice_number = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "RegNumber" => reg_number = Some(text_field(field).await?.trim().to_string()),
            "Date" => date = Some(text_field(field).await?),
            "InvoiceNumber" => invoice_number = Some(text_field(field).await?.trim().to_string()),
            "File" => {
                if file.is_some() {
                    return Err(HttpAppError(AppError::InvalidInput(
                        "Send exactly one field named 'File'".to_string(),
                    )));
                }
                file = Some(bytes_field(field).await?);
            }
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    let reg_number = required(reg_number, "RegNumber")?;
    let date = parse_visit_date(&required(date, "Date")?)?;
    let invoice_number = required(invoice_number, "InvoiceNumber")?;
    let (file_name, data) =
        file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    if data.is_empty() {
        return Err(HttpAppError(AppError::InvalidInput(
            "File is empty".to_string(),
        )));
    }

    let invoice_name = state
        .repository
        .store_invoice(&reg_number, date, &invoice_number, &file_name, data)
        .await?;

    Ok(Json(StoreInvoiceResponse { invoice_name }))
}

#[tracing::instrument(skip(state), fields(operation = "get_invoice"))]
pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let date = parse_visit_date(&query.date)?;
    let data = state
        .repository
        .get_invoice(query.reg_number.trim(), date, &query.invoice_name)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&query.invoice_name))],
        data,
    ))
}
