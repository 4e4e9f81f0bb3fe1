pub mod config;
pub mod domain {
    pub mod job;
}
pub mod processor;
pub mod queue {
    pub mod manager;
    pub mod policy;
    pub mod store_redis;
    pub mod worker;
}
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod queue_admin;
    }
    pub mod middleware {
        pub mod admin_auth;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub queue: std::sync::Arc<queue::manager::QueueManager>,
}
