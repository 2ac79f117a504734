use actix_web::{web, App, HttpServer, HttpResponse, Result as ActixResult};
use actix_cors::Cors;
use catalogx_core::{Error, Product, ProductDraft, ProductFilter, ProductId};
use catalogx_similarity::{Catalog, FeedbackEvent};
use catalogx_storage::StorageManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

pub type SharedCatalog = Arc<Catalog<StorageManager>>;

#[derive(Deserialize)]
struct DetailQuery {
    raw: Option<String>,
}

#[derive(Deserialize)]
struct FeedbackRequest {
    current_product_id: ProductId,
    clicked_product_id: ProductId,
    #[serde(default)]
    other_product_ids: Vec<ProductId>,
}

/// Write-side product shape: category and tags as ids
#[derive(Serialize)]
struct ProductResponse {
    id: ProductId,
    name: String,
    description: String,
    category: u64,
    tags: Vec<u64>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            category: product.category,
            tags: product.tags,
        }
    }
}

pub struct RestApi;

impl RestApi {
    pub async fn start(catalog: SharedCatalog, port: u16) -> std::io::Result<()> {
        info!("Starting HTTP server on port {}", port);
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(catalog.clone()))
                .configure(Self::configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }

    /// Registers every catalog route. Expects `web::Data<SharedCatalog>` app data.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/products/", web::get().to(list_products))
            .route("/products/create/", web::post().to(create_product))
            .route("/products/{id}/", web::get().to(product_detail))
            .route("/products/{id}/update/", web::put().to(update_product))
            .route("/products/{id}/delete/", web::delete().to(delete_product))
            .route("/similarity/update/", web::post().to(update_similarity))
            .route("/categories", web::get().to(list_categories))
            .route("/tags", web::get().to(list_tags));
    }
}

fn error_response(e: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        e if e.is_not_found() => HttpResponse::NotFound().json(body),
        Error::Validation(_) | Error::InvariantViolation(_) => HttpResponse::BadRequest().json(body),
        _ => {
            error!("Request failed: {}", e);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

/// Builds a filter from `category`, repeated `tags` and `search` parameters
fn parse_filter(params: &[(String, String)]) -> Result<ProductFilter, String> {
    let mut filter = ProductFilter::new();
    for (key, value) in params {
        match key.as_str() {
            "category" if !value.is_empty() => {
                let id = value
                    .parse()
                    .map_err(|_| format!("invalid category id: {}", value))?;
                filter = filter.category(id);
            }
            "tags" if !value.is_empty() => {
                let id = value
                    .parse()
                    .map_err(|_| format!("invalid tag id: {}", value))?;
                filter = filter.tag(id);
            }
            "search" if !value.is_empty() => {
                filter = filter.search(value.clone());
            }
            _ => {}
        }
    }
    Ok(filter)
}

async fn list_products(
    catalog: web::Data<SharedCatalog>,
    query: web::Query<Vec<(String, String)>>,
) -> ActixResult<HttpResponse> {
    let filter = match parse_filter(&query) {
        Ok(filter) => filter,
        Err(message) => return Ok(bad_request(message)),
    };

    match catalog.list_products(&filter) {
        Ok(products) => Ok(HttpResponse::Ok().json(products)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn create_product(
    catalog: web::Data<SharedCatalog>,
    req: web::Json<ProductDraft>,
) -> ActixResult<HttpResponse> {
    match catalog.create_product(req.into_inner()) {
        Ok(product) => Ok(HttpResponse::Created().json(ProductResponse::from(product))),
        Err(e) if e.is_not_found() => Ok(bad_request(e.to_string())),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn product_detail(
    catalog: web::Data<SharedCatalog>,
    path: web::Path<ProductId>,
    query: web::Query<DetailQuery>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();

    if query.raw.as_deref() == Some("1") {
        return match catalog.get_product(id) {
            Ok(product) => Ok(HttpResponse::Ok().json(product)),
            Err(e) => Ok(error_response(&e)),
        };
    }

    match catalog.product_detail(id) {
        Ok(detail) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "product": detail.product,
            "recommendations": detail.recommendations,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn update_product(
    catalog: web::Data<SharedCatalog>,
    path: web::Path<ProductId>,
    req: web::Json<ProductDraft>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    match catalog.update_product(id, req.into_inner()) {
        Ok(product) => Ok(HttpResponse::Ok().json(ProductResponse::from(product))),
        // Unknown category/tag references are payload errors, not a missing product
        Err(e @ (Error::CategoryNotFound(_) | Error::TagNotFound(_))) => Ok(bad_request(e.to_string())),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn delete_product(
    catalog: web::Data<SharedCatalog>,
    path: web::Path<ProductId>,
) -> ActixResult<HttpResponse> {
    match catalog.delete_product(path.into_inner()) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn update_similarity(
    catalog: web::Data<SharedCatalog>,
    req: web::Json<FeedbackRequest>,
) -> ActixResult<HttpResponse> {
    let req = req.into_inner();
    let event = FeedbackEvent::new(
        req.current_product_id,
        req.clicked_product_id,
        req.other_product_ids,
    );

    match catalog.record_feedback(&event) {
        Ok(_) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn list_categories(catalog: web::Data<SharedCatalog>) -> ActixResult<HttpResponse> {
    match catalog.list_categories() {
        Ok(categories) => Ok(HttpResponse::Ok().json(categories)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn list_tags(catalog: web::Data<SharedCatalog>) -> ActixResult<HttpResponse> {
    match catalog.list_tags() {
        Ok(tags) => Ok(HttpResponse::Ok().json(tags)),
        Err(e) => Ok(error_response(&e)),
    }
}
