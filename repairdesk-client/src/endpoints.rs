//! Typed wrappers for the backend endpoints.

use shared::models::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest, MessageResponse, Order,
    OrderReport, OrderStatus, RegisterRequest, RegisteredUser, ResetPasswordRequest,
    UpdateOrderPriceRequest, UpdateOrderStatusRequest, UserProfile,
};
use tracing::{info, instrument, warn};

use crate::{
    error::{ClientError, ClientResult},
    pipeline::{ApiClient, ApiRequest},
};

pub(crate) const LOGIN_PATH: &str = "login/";
pub(crate) const REGISTER_PATH: &str = "register/";
pub(crate) const LOGOUT_PATH: &str = "logout/";
pub(crate) const CURRENT_USER_PATH: &str = "user/me/";
pub(crate) const FORGOT_PASSWORD_PATH: &str = "forgot-password/";
pub(crate) const ORDERS_PATH: &str = "orders/";
pub(crate) const ORDER_REPORTS_PATH: &str = "orders/reports/";
pub(crate) const CUSTOMERS_PATH: &str = "users/customers/";
pub(crate) const STAFF_PATH: &str = "users/staff/";

impl ApiClient {
    /// Authenticate and establish the session.
    ///
    /// # Errors
    /// Returns [`ClientError::Api`] when the backend rejects the credentials,
    /// or a storage error if the new session cannot be persisted.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> ClientResult<UserProfile> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        })?;
        let response: LoginResponse = self.send_json(&request).await?;

        self.session()
            .login(response.user, response.access, response.refresh)?;
        self.session()
            .user()
            .ok_or(ClientError::SessionEnded)
    }

    /// Create a customer account. Does not sign in.
    ///
    /// # Errors
    /// Returns [`ClientError::Api`] with the backend's field errors on rejection.
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<RegisteredUser> {
        self.send_json(&ApiRequest::post(REGISTER_PATH).json(request)?)
            .await
    }

    /// End the session, telling the backend to invalidate the refresh token first.
    ///
    /// The server-side call is best effort: its failure is logged and the local
    /// session is cleared regardless. Returns `true` when a session was active
    /// on entry, even if a failed refresh during the server call already ended it.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> bool {
        let was_authenticated = self.session().is_authenticated();
        if was_authenticated {
            let body = LogoutRequest {
                refresh: self.session().refresh_token(),
            };
            match ApiRequest::post(LOGOUT_PATH).json(&body) {
                Ok(request) => match self.send(&request).await {
                    Ok(response) if !response.status().is_success() => {
                        warn!(status = %response.status(), "server-side logout rejected");
                    }
                    Ok(_) => info!("server-side logout acknowledged"),
                    Err(err) => warn!(error = %err, "server-side logout failed"),
                },
                Err(err) => warn!(error = %err, "failed to encode logout request"),
            }
        }
        self.session().logout() || was_authenticated
    }

    /// Fetch the current profile and refresh the cached copy.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn current_user(&self) -> ClientResult<UserProfile> {
        let generation = self.session().generation();
        let user: UserProfile = self
            .send_json(&ApiRequest::get(CURRENT_USER_PATH))
            .await?;
        self.session().apply_profile(user.clone(), generation);
        Ok(user.normalized())
    }

    /// Ask the backend to email a password-reset link.
    ///
    /// # Errors
    /// Returns [`ClientError::Api`] when the email is unknown.
    pub async fn forgot_password(&self, email: &str) -> ClientResult<MessageResponse> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).json(&ForgotPasswordRequest {
            email: email.to_string(),
        })?;
        self.send_json(&request).await
    }

    /// Complete a password reset from an emailed link.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] without contacting the backend when
    /// the two passwords differ.
    pub async fn reset_password(
        &self,
        uid: &str,
        token: &str,
        request: &ResetPasswordRequest,
    ) -> ClientResult<MessageResponse> {
        if !request.passwords_match() {
            return Err(ClientError::Validation("passwords do not match".to_string()));
        }
        let path = format!("reset-password/{uid}/{token}/");
        self.send_json(&ApiRequest::post(path).json(request)?).await
    }

    /// Orders visible to the signed-in account.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn list_orders(&self) -> ClientResult<Vec<Order>> {
        self.send_json(&ApiRequest::get(ORDERS_PATH)).await
    }

    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn get_order(&self, id: i64) -> ClientResult<Order> {
        self.send_json(&ApiRequest::get(order_path(id))).await
    }

    /// Cancel an order. The backend marks open orders as rejected.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn cancel_order(&self, id: i64) -> ClientResult<Order> {
        let path = format!("{ORDERS_PATH}{id}/cancel/");
        self.send_json(&ApiRequest::post(path)).await
    }

    /// Staff-only status change.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn update_order_status(&self, id: i64, status: OrderStatus) -> ClientResult<Order> {
        let request =
            ApiRequest::patch(order_path(id)).json(&UpdateOrderStatusRequest { status })?;
        self.send_json(&request).await
    }

    /// Staff-only price change. `price` must be a non-negative decimal.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] without contacting the backend for
    /// a malformed price, otherwise the pipeline failure or [`ClientError::Api`].
    pub async fn update_order_price(&self, id: i64, price: &str) -> ClientResult<Order> {
        let total_price = normalize_price(price)?;
        let request =
            ApiRequest::patch(order_path(id)).json(&UpdateOrderPriceRequest { total_price })?;
        self.send_json(&request).await
    }

    /// Admin-only order totals.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`], typically `403`
    /// for non-admin accounts.
    pub async fn order_report(&self) -> ClientResult<OrderReport> {
        self.send_json(&ApiRequest::get(ORDER_REPORTS_PATH)).await
    }

    /// Admin-only list of customer accounts.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn list_customers(&self) -> ClientResult<Vec<UserProfile>> {
        self.list_users(CUSTOMERS_PATH).await
    }

    /// Admin-only list of staff accounts.
    ///
    /// # Errors
    /// Returns the pipeline failure or [`ClientError::Api`] on a business error.
    pub async fn list_staff(&self) -> ClientResult<Vec<UserProfile>> {
        self.list_users(STAFF_PATH).await
    }

    async fn list_users(&self, path: &str) -> ClientResult<Vec<UserProfile>> {
        let users: Vec<UserProfile> = self.send_json(&ApiRequest::get(path)).await?;
        Ok(users.into_iter().map(UserProfile::normalized).collect())
    }
}

/// Render a user-entered price as a two-decimal amount.
pub(crate) fn normalize_price(price: &str) -> ClientResult<String> {
    match price.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(format!("{value:.2}")),
        _ => Err(ClientError::Validation(format!("invalid price: {price}"))),
    }
}

fn order_path(id: i64) -> String {
    format!("{ORDERS_PATH}{id}/")
}
