pub mod http;

pub use http::{
    create_router, ApiServer, AppState, DataResponse, ErrorResponse, StatusResponse, SubscribeRequest,
    TransactionsQuery,
};
