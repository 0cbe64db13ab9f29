/// Purchase endpoints
///
/// A purchase is one transaction: the order row, the buyer's enrollment
/// (one unwatched progress entry per lesson) and the course's purchase
/// counter move together.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiJson},
    middleware::auth::CurrentUser,
    response::ApiResponse,
    routes::present,
};
use axum::{extract::State, Extension};
use byway_shared::{
    integrations::MailTemplate,
    models::{
        course::Course,
        order::Order,
        user::{Enrollment, User},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ALREADY_PURCHASED: &str = "You have already purchased this course";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub course_id: Option<String>,

    /// Gateway payload; its `id` names the payment intent to verify
    #[serde(default, rename = "payment_info")]
    pub payment_info: Option<Value>,
}

/// Payment intent id carried in the order payload, if any
fn payment_intent_id(payment_info: Option<&Value>) -> Option<&str> {
    payment_info?
        .get("id")?
        .as_str()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Enrolls the caller in a course
///
/// # Errors
///
/// - `400`: payment not succeeded, course already purchased
/// - `404`: course not found
pub async fn create_order(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> ApiResult<ApiResponse<Order>> {
    if let Some(intent_id) = payment_intent_id(req.payment_info.as_ref()) {
        let intent = state.services.payments.retrieve_intent(intent_id).await?;
        if !intent.succeeded() {
            tracing::warn!(intent_id, status = %intent.status, "Order with unpaid intent");
            return Err(ApiError::BadRequest("Payment failed".to_string()));
        }
    }

    let course_id = present(req.course_id)
        .ok_or_else(|| ApiError::BadRequest("Please provide a courseId".to_string()))?;
    let course_id = parse_id(&course_id)?;

    if user.is_enrolled(course_id) {
        return Err(ApiError::BadRequest(ALREADY_PURCHASED.to_string()));
    }

    let course = Course::find_by_id(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let mut tx = state.db.begin().await?;

    let mut buyer = User::lock_for_update(&mut tx, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    if buyer.is_enrolled(course_id) {
        return Err(ApiError::BadRequest(ALREADY_PURCHASED.to_string()));
    }

    let order = Order::create(&mut tx, course.id, buyer.id, req.payment_info).await?;
    buyer
        .courses
        .push(Enrollment::new(course.id, course.video_ids()));
    User::save_courses(&mut tx, buyer.id, &buyer.courses).await?;
    Course::increment_purchase(&mut tx, course.id).await?;

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        course_id = %course.id,
        user_id = %buyer.id,
        "Order created"
    );

    state
        .notify(
            buyer.id,
            "New Order",
            format!("You have a new order from {}", course.name),
        )
        .await?;

    state
        .send_mail_best_effort(
            &buyer.email,
            MailTemplate::OrderConfirmation {
                order_id: order.id.simple().to_string()[..6].to_string(),
                course_name: course.name.clone(),
                user_name: buyer.name.clone(),
                price: format!("{:.2}", course.price),
                date: order.created_at.format("%-d %B %Y").to_string(),
            },
        )
        .await;

    Ok(ApiResponse::created(
        order,
        "You have successfully purchased this course!",
    ))
}

pub async fn get_all_orders(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Order>>> {
    let orders = Order::list_all(&state.db).await?;
    Ok(ApiResponse::ok(orders, "Orders fetched"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishableKey {
    pub publishable_key: String,
}

pub async fn publishable_key(State(state): State<AppState>) -> ApiResponse<PublishableKey> {
    ApiResponse::ok(
        PublishableKey {
            publishable_key: state.services.payments.publishable_key().to_string(),
        },
        "Key sent",
    )
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub amount: Option<i64>,
}

/// Client secret of a new payment intent
#[derive(Debug, Serialize)]
pub struct PaymentSecret {
    pub re_cur: String,
}

/// Opens a payment intent for the checkout form
pub async fn new_payment(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> ApiResult<ApiResponse<PaymentSecret>> {
    let amount = req
        .amount
        .filter(|a| *a > 0)
        .ok_or_else(|| ApiError::BadRequest("Please provide a valid amount".to_string()))?;

    let intent = state.services.payments.create_intent(amount).await?;
    let client_secret = intent
        .client_secret
        .ok_or_else(|| ApiError::internal("Payment intent returned without a client secret"))?;

    Ok(ApiResponse::ok(
        PaymentSecret {
            re_cur: client_secret,
        },
        "Payment Successful",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_intent_id() {
        let info = json!({"id": "pi_123", "status": "succeeded"});
        assert_eq!(payment_intent_id(Some(&info)), Some("pi_123"));

        assert_eq!(payment_intent_id(Some(&json!({"id": ""}))), None);
        assert_eq!(payment_intent_id(Some(&json!({"amount": 10}))), None);
        assert_eq!(payment_intent_id(None), None);
    }

    #[test]
    fn test_order_request_reads_snake_case_payment_info() {
        let req: CreateOrderRequest =
            serde_json::from_value(json!({"courseId": "abc", "payment_info": {"id": "pi_1"}}))
                .unwrap();
        assert_eq!(req.course_id.as_deref(), Some("abc"));
        assert_eq!(payment_intent_id(req.payment_info.as_ref()), Some("pi_1"));
    }
}
