//! HTTP front end for the ticket allocation engine
//!
//! A thin transport shim: parses requests, hands them to the engine, renders
//! JSON. Identity is an opaque `X-User-Id` header; a demo event is seeded at
//! startup since catalog management lives outside this service.

#![warn(missing_docs)]

mod http;

use std::thread;

use event_tix_core::{Config, PriorityClass, TicketType};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Command line options
#[derive(Debug)]
struct Opts {
    /// Configuration of the allocation engine
    config: Config,

    /// Port for the HTTP server to listen on
    port: u16,
    /// Host for the HTTP server to listen on
    host: String,
    /// Number of worker threads
    threads: u32,

    /// Capacity of the seeded VIP class
    vip_capacity: u32,
    /// Capacity of the seeded Regular class
    regular_capacity: u32,
    /// Unit price of the seeded VIP class, in cents
    vip_price_cents: u32,
    /// Unit price of the seeded Regular class, in cents
    regular_price_cents: u32,
}

impl Opts {
    fn from_args() -> Self {
        let mut opts = Opts {
            port: 8585,
            host: String::from("127.0.0.1"),
            config: Config::default(),
            threads: 16,
            vip_capacity: 100,
            regular_capacity: 900,
            vip_price_cents: 15_000,
            regular_price_cents: 5_000,
        };

        let mut option: Option<String> = None;
        for arg in std::env::args().skip(1) {
            if let Some(opt) = option {
                match opt.as_str() {
                    "-port" => opts.port = arg.parse().expect("-port takes a decimal u16"),
                    "-host" => opts.host = arg,
                    "-threads" => {
                        opts.threads = arg.parse().expect("-threads takes a decimal u32")
                    }
                    "-tick-ms" => {
                        opts.config.tick_ms = arg.parse().expect("-tick-ms takes a decimal u64")
                    }
                    "-batch-per-tick" => {
                        opts.config.batch_per_tick =
                            arg.parse().expect("-batch-per-tick takes a decimal u32")
                    }
                    "-max-orders-per-user" => {
                        opts.config.max_orders_per_user =
                            arg.parse().expect("-max-orders-per-user takes a decimal u32")
                    }
                    "-audit" => opts.config.audit_path = Some(arg.into()),
                    "-vip-capacity" => {
                        opts.vip_capacity = arg.parse().expect("-vip-capacity takes a decimal u32")
                    }
                    "-regular-capacity" => {
                        opts.regular_capacity =
                            arg.parse().expect("-regular-capacity takes a decimal u32")
                    }
                    "-vip-price" => {
                        opts.vip_price_cents = arg.parse().expect("-vip-price takes cents")
                    }
                    "-regular-price" => {
                        opts.regular_price_cents = arg.parse().expect("-regular-price takes cents")
                    }
                    _ => {
                        eprintln!("Error: unknown option {opt}");
                        std::process::exit(1);
                    }
                }
                option = None;
            } else {
                option = Some(arg);
            }
        }
        if let Some(opt) = option {
            eprintln!("Error: option {opt} is missing its value");
            std::process::exit(1);
        }

        opts
    }
}

fn http_loop(server: &tiny_http::Server, engine: &event_tix_engine::Engine, event_id: Uuid) {
    loop {
        let rq = server.recv().expect("HTTP receive failed");
        http::handle(rq, engine, event_id);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::from_args();
    let engine = event_tix_engine::launch(opts.config.clone());

    // seed the demo event; catalog CRUD is an external collaborator
    let event_id = Uuid::new_v4();
    engine.register_ticket_type(TicketType {
        id: Uuid::new_v4(),
        event_id,
        class: PriorityClass::Vip,
        capacity: opts.vip_capacity,
        sold_count: 0,
        price_cents: opts.vip_price_cents,
        sale_start: None,
        sale_end: None,
    });
    engine.register_ticket_type(TicketType {
        id: Uuid::new_v4(),
        event_id,
        class: PriorityClass::Regular,
        capacity: opts.regular_capacity,
        sold_count: 0,
        price_cents: opts.regular_price_cents,
        sale_start: None,
        sale_end: None,
    });
    tracing::info!(%event_id, host = %opts.host, port = opts.port, "event seeded, listening");

    let server = tiny_http::Server::http((opts.host.as_str(), opts.port)).unwrap();

    thread::scope(|s| {
        for i in 0..opts.threads {
            thread::Builder::new()
                .name(format!("worker_{i}"))
                .spawn_scoped(s, || http_loop(&server, &engine, event_id))
                .unwrap();
        }
    });
}
