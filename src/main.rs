mod telemetry;

use event_reminder_api::Application;
use event_reminder_infra::{run_migration, setup_context};
use std::io::{Error, ErrorKind};
use telemetry::{get_subscriber, init_subscriber};

fn startup_error<E: std::fmt::Display>(e: E) -> Error {
    Error::new(ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    openssl_probe::init_ssl_cert_env_vars();

    let subscriber = get_subscriber("event_reminder_scheduler".into(), "info".into());
    init_subscriber(subscriber).map_err(startup_error)?;

    run_migration().await.map_err(startup_error)?;
    let context = setup_context().await.map_err(startup_error)?;

    let app = Application::new(context).await?;
    app.start().await
}
