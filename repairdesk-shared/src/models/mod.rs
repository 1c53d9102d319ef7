//! Wire models exchanged with the RepairDesk REST backend.

pub mod auth;
pub mod errors;
pub mod orders;
pub mod user;

pub use auth::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest, MessageResponse,
    RefreshRequest, RefreshResponse, RegisterRequest, RegisteredUser, ResetPasswordRequest,
};
pub use errors::ErrorResponse;
pub use orders::{
    Order, OrderItem, OrderReport, OrderStatus, UpdateOrderPriceRequest, UpdateOrderStatusRequest,
};
pub use user::{UserProfile, UserRole};
