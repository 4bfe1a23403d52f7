use utoipa::OpenApi;

use crate::routes::account::AccountApi;
use crate::routes::chats::ChatApi;
use crate::routes::health::HealthApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "freeseek-server",
    description = "FreeSeek chat service API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(AccountApi::openapi());
    root.merge(ChatApi::openapi());
    root.merge(HealthApi::openapi());
    root
}
