use super::db_error;
use crate::orm::covers;
use crate::storage::{is_valid_key, StorageBackend, StorageError};
use actix_web::http::header;
use actix_web::{error, get, web, Error, HttpResponse};
use sea_orm::{entity::*, query::*, DatabaseConnection};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_upload);
}

/// Serves a stored cover by its exact content-addressed filename.
#[get("/uploads/{filename}")]
pub async fn view_upload(
    db: web::Data<DatabaseConnection>,
    storage: web::Data<dyn StorageBackend>,
    filename: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let filename = filename.into_inner();
    if !is_valid_key(&filename) {
        log::debug!("view_upload: rejected filename {:?}", filename);
        return Err(error::ErrorNotFound("File not found."));
    }

    let object = match storage.get_object(&filename).await {
        Ok(object) => object,
        Err(StorageError::NotFound(_)) | Err(StorageError::InvalidKey(_)) => {
            return Err(error::ErrorNotFound("File not found."));
        }
        Err(e) => {
            log::error!("view_upload: {}", e);
            return Err(error::ErrorInternalServerError("Storage error."));
        }
    };

    // The recorded upload type wins over a guess from the extension.
    let recorded = covers::Entity::find()
        .filter(covers::Column::Filename.eq(filename.as_str()))
        .one(db.get_ref())
        .await
        .map_err(|e| db_error("view_upload", e))?
        .map(|cover| cover.mimetype);
    let content_type = recorded
        .or(object.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_owned());

    let mut resp = HttpResponse::Ok();
    resp.insert_header((header::CONTENT_TYPE, content_type))
        .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"));
    if let Some(e_tag) = object.e_tag {
        resp.insert_header((header::ETAG, e_tag));
    }
    if let Some(last_modified) = object.last_modified {
        resp.insert_header((header::LAST_MODIFIED, last_modified));
    }

    Ok(resp.streaming(object.body))
}
