//! Request routing and JSON rendering

use std::io::Read;

use chrono::{DateTime, Utc};
use event_tix_core::{AllocationError, Order, OrderStatus, PriorityClass, TicketStatus};
use event_tix_engine::Engine;
use serde::{Deserialize, Serialize};
use tiny_http::{Header, Method, Response};
use uuid::Uuid;

#[derive(Deserialize)]
struct PurchaseBody {
    event_id: Uuid,
    ticket_type: String,
    #[serde(default)]
    promo_code: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: String,
}

#[derive(Serialize)]
struct EnqueueView {
    request_id: Uuid,
    position: usize,
}

#[derive(Serialize)]
struct StatusView {
    status: event_tix_core::RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
struct OrderView {
    order_id: Uuid,
    status: OrderStatus,
    event_id: Uuid,
    ticket_type: &'static str,
    qr_token: String,
    ticket_status: TicketStatus,
    ticket_price_cents: u32,
    discount_cents: u32,
    total_cents: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    promo_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            event_id: order.event_id,
            ticket_type: order.class.as_str(),
            qr_token: order.ticket.qr_token,
            ticket_status: order.ticket.status,
            ticket_price_cents: order.ticket_price_cents,
            discount_cents: order.discount_cents,
            total_cents: order.total_cents,
            promo_code: order.promo_code,
            created_at: order.created_at,
        }
    }
}

#[derive(Serialize)]
struct QuoteView {
    ticket_price_cents: u32,
    discount_cents: u32,
    total_cents: u32,
}

#[derive(Serialize)]
struct VerifyView {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<Uuid>,
}

#[derive(Serialize)]
struct CheckInView {
    ok: bool,
    previous_status: TicketStatus,
    new_status: TicketStatus,
}

#[derive(Serialize)]
struct AvailabilityView {
    ticket_type: &'static str,
    capacity: u32,
    sold_count: u32,
    remaining: u32,
    price_cents: u32,
}

/// Dispatch one HTTP request against the engine
pub fn handle(mut rq: tiny_http::Request, engine: &Engine, default_event: Uuid) {
    let method = rq.method().clone();
    if method == Method::Options {
        let mut res = Response::empty(204);
        add_cors_headers(&mut res);
        let _ = rq.respond(res);
        return;
    }

    let user_id = user_id_of(&rq);
    let url = rq.url().to_string();
    let path: Vec<&str> = url
        .split('?')
        .next()
        .unwrap_or("")
        .trim_matches('/')
        .split('/')
        .collect();

    match (&method, path.as_slice()) {
        (Method::Get, ["api", "event"]) => {
            let classes = availability_views(engine, default_event);
            respond_json(
                rq,
                200,
                &serde_json::json!({ "event_id": default_event, "ticket_types": classes }),
            );
        }
        (Method::Get, ["api", "availability", event]) => match parse_uuid(event) {
            Some(event_id) => {
                let classes = availability_views(engine, event_id);
                respond_json(rq, 200, &classes);
            }
            None => respond_bad_request(rq, "event id is not a uuid"),
        },
        (Method::Post, ["api", "queue"]) => match read_purchase_body(&mut rq) {
            Ok(body) => match parse_class(&body.ticket_type) {
                Some(class) => match engine.enqueue(user_id, body.event_id, class) {
                    Ok((request_id, position)) => {
                        respond_json(rq, 200, &EnqueueView { request_id, position })
                    }
                    Err(err) => respond_error(rq, &err),
                },
                None => respond_bad_request(rq, "unknown ticket type"),
            },
            Err(msg) => respond_bad_request(rq, &msg),
        },
        (Method::Get, ["api", "queue", id]) => match parse_uuid(id) {
            Some(request_id) => match engine.request_status(request_id) {
                Ok(view) => respond_json(
                    rq,
                    200,
                    &StatusView {
                        status: view.status,
                        position: view.position,
                        order_id: view.result_order_id,
                        reason: view.failure_reason,
                    },
                ),
                Err(err) => respond_error(rq, &err),
            },
            None => respond_bad_request(rq, "request id is not a uuid"),
        },
        (Method::Post, ["api", "checkout"]) => match read_purchase_body(&mut rq) {
            Ok(body) => match parse_class(&body.ticket_type) {
                Some(class) => {
                    match engine.checkout(user_id, body.event_id, class, body.promo_code.as_deref())
                    {
                        Ok(order) => respond_json(rq, 200, &OrderView::from(order)),
                        Err(err) => respond_error(rq, &err),
                    }
                }
                None => respond_bad_request(rq, "unknown ticket type"),
            },
            Err(msg) => respond_bad_request(rq, &msg),
        },
        (Method::Post, ["api", "quote"]) => match read_purchase_body(&mut rq) {
            Ok(body) => match parse_class(&body.ticket_type) {
                Some(class) => {
                    match engine.quote(user_id, body.event_id, class, body.promo_code.as_deref()) {
                        Ok(quote) => respond_json(
                            rq,
                            200,
                            &QuoteView {
                                ticket_price_cents: quote.ticket_price_cents,
                                discount_cents: quote.discount_cents,
                                total_cents: quote.total_cents,
                            },
                        ),
                        Err(err) => respond_error(rq, &err),
                    }
                }
                None => respond_bad_request(rq, "unknown ticket type"),
            },
            Err(msg) => respond_bad_request(rq, &msg),
        },
        (Method::Get, ["api", "tickets", "verify", token]) => {
            let v = engine.verify(token);
            respond_json(
                rq,
                200,
                &VerifyView {
                    valid: v.valid,
                    status: v.status,
                    order_id: v.order_id,
                },
            );
        }
        (Method::Post, ["api", "tickets", "checkin", token]) => match engine.check_in(token) {
            Ok(result) => respond_json(
                rq,
                200,
                &CheckInView {
                    ok: result.ok,
                    previous_status: result.previous_status,
                    new_status: result.new_status,
                },
            ),
            Err(err) => respond_error(rq, &err),
        },
        (Method::Post, ["api", "orders", id, "cancel"]) => match parse_uuid(id) {
            Some(order_id) => match engine.cancel(order_id, user_id) {
                Ok(()) => respond_json(rq, 200, &serde_json::json!({ "ok": true })),
                Err(err) => respond_error(rq, &err),
            },
            None => respond_bad_request(rq, "order id is not a uuid"),
        },
        (Method::Get, ["api", "orders"]) => {
            let orders: Vec<OrderView> = engine
                .orders_for_user(user_id)
                .into_iter()
                .map(OrderView::from)
                .collect();
            respond_json(rq, 200, &orders);
        }
        _ => {
            let mut res = Response::from_string(
                "could not find the service you are looking for!

Valid requests are:
  GET  /api/event
  GET  /api/availability/{event_id}
  POST /api/queue
  GET  /api/queue/{request_id}
  POST /api/checkout
  POST /api/quote
  GET  /api/tickets/verify/{qr_token}
  POST /api/tickets/checkin/{qr_token}
  POST /api/orders/{order_id}/cancel
  GET  /api/orders",
            )
            .with_status_code(404);
            add_cors_headers(&mut res);
            let _ = rq.respond(res);
        }
    }
}

fn availability_views(engine: &Engine, event_id: Uuid) -> Vec<AvailabilityView> {
    engine
        .availability(event_id)
        .into_iter()
        .map(|tt| AvailabilityView {
            ticket_type: tt.class.as_str(),
            capacity: tt.capacity,
            sold_count: tt.sold_count,
            remaining: tt.remaining(),
            price_cents: tt.price_cents,
        })
        .collect()
}

/// Opaque authenticated user id; generated when the header is absent
fn user_id_of(rq: &tiny_http::Request) -> Uuid {
    for hdr in rq.headers() {
        if hdr.field.equiv("x-user-id") {
            if let Ok(id) = Uuid::parse_str(hdr.value.as_str()) {
                return id;
            }
        }
    }
    Uuid::new_v4()
}

fn parse_uuid(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s).ok()
}

fn parse_class(s: &str) -> Option<PriorityClass> {
    PriorityClass::parse(s)
}

fn read_purchase_body(rq: &mut tiny_http::Request) -> Result<PurchaseBody, String> {
    let mut body = String::with_capacity(rq.body_length().unwrap_or(256));
    rq.as_reader()
        .read_to_string(&mut body)
        .map_err(|err| format!("could not read the request body: {err}"))?;
    serde_json::from_str(&body).map_err(|err| format!("invalid request body: {err}"))
}

fn status_code_of(err: &AllocationError) -> u16 {
    match err {
        AllocationError::SoldOut | AllocationError::InvalidTransition { .. } => 409,
        AllocationError::NotFound(_) => 404,
        AllocationError::InvalidPromo(_)
        | AllocationError::SaleWindowClosed
        | AllocationError::UserLimitReached { .. } => 400,
    }
}

fn respond_error(rq: tiny_http::Request, err: &AllocationError) {
    let status = status_code_of(err);
    respond_json(
        rq,
        status,
        &ErrorBody {
            error: err.to_string(),
            code: err.code(),
        },
    );
}

fn respond_bad_request(rq: tiny_http::Request, msg: &str) {
    respond_json(
        rq,
        400,
        &ErrorBody {
            error: msg.to_string(),
            code: "bad_request".into(),
        },
    );
}

fn respond_json<T: Serialize>(rq: tiny_http::Request, status: u16, body: &T) {
    let payload = serde_json::to_string(body).expect("response serialization failed");
    let mut res = Response::from_string(payload).with_status_code(status);
    res.add_header(Header::from_bytes(b"Content-Type", b"application/json").unwrap());
    add_cors_headers(&mut res);
    if let Err(err) = rq.respond(res) {
        tracing::warn!(%err, "HTTP response failed");
    }
}

fn add_cors_headers<R: Read>(res: &mut Response<R>) {
    res.add_header(Header::from_bytes(b"Access-Control-Allow-Origin", b"*").unwrap());
    res.add_header(Header::from_bytes(b"Access-Control-Allow-Headers", b"*").unwrap());
    res.add_header(Header::from_bytes(b"Access-Control-Expose-Headers", b"*").unwrap());
}
