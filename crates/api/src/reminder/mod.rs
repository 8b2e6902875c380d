pub mod cancel_stale_reminders;
pub mod schedule_reminders;

use actix_web::web;
use cancel_stale_reminders::cancel_stale_reminders_controller;
use schedule_reminders::schedule_reminders_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/reminders/schedule",
        web::post().to(schedule_reminders_controller),
    );
    cfg.route(
        "/reminders/cleanup",
        web::post().to(cancel_stale_reminders_controller),
    );
}
