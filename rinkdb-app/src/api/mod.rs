mod error;
mod scheduler;

#[rocket::get("/")]
pub async fn index() -> &'static str {
    "This is the rinkdb API."
}

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        index,
        scheduler::list_configs,
        scheduler::get_config,
        scheduler::create_config,
        scheduler::update_config,
        scheduler::delete_config,
        scheduler::start,
        scheduler::pause,
        scheduler::resume,
        scheduler::stop,
        scheduler::runs,
    ]
}
