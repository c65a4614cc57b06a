use actix_web::HttpResponse;

use crate::session_state::TypedSession;

// Success-redirect target for the hosted checkout. Settlement itself is
// webhook-driven; the redirect only clears the diner's session cart
// (the cart-pay contract) since the webhook cannot reach the cookie.
#[tracing::instrument(
    "Completing checkout redirect",
    skip(session)
)]
pub async fn payment_complete(session: TypedSession) -> HttpResponse {
    session.clear_cart();

    HttpResponse::Ok().body("Payment received, you can return to your table view")
}
