use actix_session::{Session, SessionExt, SessionGetError, SessionInsertError};
use actix_web::{dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform}, error::ErrorForbidden, FromRequest};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::Instrument;
use uuid::Uuid;

const USER_ID_KEY: &str = "user_id";
const USERNAME_KEY: &str = "username";
const TABLE_ID_KEY: &str = "table_id";
const CART_KEY: &str = "cart";

// Cookie-backed per-diner context: identity, current table and the ids of
// the cart items this diner added (the "session cart" settled by cart-pay).
pub struct TypedSession(pub Session);

impl TypedSession {
    pub fn get_user_id(&self) -> Result<Option<Uuid>, SessionGetError> {
        self.0.get(USER_ID_KEY)
    }

    pub fn set_user_id(&self, user_id: Uuid) -> Result<(), SessionInsertError> {
        self.0.insert(USER_ID_KEY, user_id)
    }

    pub fn get_username(&self) -> Result<Option<String>, SessionGetError> {
        self.0.get(USERNAME_KEY)
    }

    pub fn set_username(&self, username: &str) -> Result<(), SessionInsertError> {
        self.0.insert(USERNAME_KEY, username)
    }

    pub fn get_table_id(&self) -> Result<Option<Uuid>, SessionGetError> {
        self.0.get(TABLE_ID_KEY)
    }

    pub fn set_table_id(&self, table_id: Uuid) -> Result<(), SessionInsertError> {
        self.0.insert(TABLE_ID_KEY, table_id)
    }

    pub fn get_cart(&self) -> Result<Vec<Uuid>, SessionGetError> {
        Ok(self.0.get(CART_KEY)?.unwrap_or_default())
    }

    pub fn push_cart_item(&self, cart_item_id: Uuid) -> Result<(), anyhow::Error> {
        let mut cart = self.get_cart()?;
        cart.push(cart_item_id);
        self.0.insert(CART_KEY, cart)?;
        Ok(())
    }

    pub fn clear_cart(&self) {
        self.0.remove(CART_KEY);
    }

    // Session-level cleanup when an order ends: the identity survives, the
    // table attachment and cart snapshot do not.
    pub fn leave_table(&self) {
        self.0.remove(TABLE_ID_KEY);
        self.0.remove(CART_KEY);
    }

    pub fn renew(&self) {
        self.0.renew();
    }
}

impl FromRequest for TypedSession {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let session = req.get_session();
        ready(Ok(TypedSession(session)))
    }
}

// Guard for diner endpoints that only make sense after joining a table
pub struct RequireDinerFactory;

impl<S> Transform<S, ServiceRequest> for RequireDinerFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = actix_web::Error>,
    S::Future: 'static,
{
    type Response = ServiceResponse;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequireDinerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireDinerMiddleware{service}))
    }
}

pub struct RequireDinerMiddleware<S>{
    service: S
}

impl<S> Service<ServiceRequest> for RequireDinerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = actix_web::Error>,
    S::Future: 'static
{
        type Error = actix_web::Error;
        type Response = S::Response;
        type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

        forward_ready!(service);

        #[tracing::instrument(
            "Checking that the request carries an established diner identity",
            skip(self, req)
        )]
        fn call(&self, req: ServiceRequest) -> Self::Future {
            let session = TypedSession(req.get_session());
            let user_id_option = session.get_user_id().ok().flatten();

            let current_span = tracing::Span::current();

            if user_id_option.is_none(){
                return Box::pin(ready(
                    Err(ErrorForbidden("Join the table first"))
                ).instrument(current_span))
            }


            let fut = self.service.call(req);

            Box::pin(async move {
                let res = fut.await?;
                Ok(res)
            }
            .instrument(current_span))
        }
}
