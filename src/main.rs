use actix_web::{middleware, web, App, HttpServer};
use advdemo::config::Settings;
use advdemo::server::routes;
use advdemo::session::Orchestrator;
use advdemo::util::init_tracing;
use std::{env, process};

use tracing::info;

const USAGE: &str = "usage: ./advdemo [config file]";

fn get_args() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 || args.iter().any(|arg| arg == "-h" || arg == "--help") {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).cloned()
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config_file = get_args();
    let settings = Settings::load(config_file.as_deref())?;
    init_tracing(&settings.log);

    let orchestrator = web::Data::new(Orchestrator::from_settings(&settings)?);
    if let Some(endpoint) = settings.endpoint() {
        info!("forwarding predictions and attacks to {endpoint}");
    }

    info!("listening on 0.0.0.0:{}", settings.port);
    HttpServer::new(move || {
        App::new()
            .app_data(orchestrator.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", settings.port))?
    .run()
    .await?;

    Ok(())
}
