use actix_web::HttpResponse;

#[tracing::instrument(
    "Checking if the table service is online"
)]
pub async fn health_check() -> HttpResponse{
    HttpResponse::Ok().body("Working")
}
