use nw_services::NewsServices;

pub struct AppState {
    pub services: NewsServices,
}

impl AppState {
    pub fn new(services: NewsServices) -> Self {
        Self { services }
    }
}
