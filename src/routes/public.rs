use crate::error::CommunityError;
use crate::helper::community_helpers;
use crate::DbPool;
use actix_web::{web, HttpResponse, Responder};

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/communities", web::get().to(list_communities)),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

async fn list_communities(pool: web::Data<DbPool>) -> Result<HttpResponse, CommunityError> {
    let conn = pool.get()?;
    let communities = community_helpers::list_communities(&conn)?;
    Ok(HttpResponse::Ok().json(communities))
}
