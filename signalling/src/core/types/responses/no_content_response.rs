use salvo::http::StatusCode;
use salvo::oapi::{self, EndpointOutRegister};
use salvo::prelude::*;

#[derive(Debug, Clone, Copy)]
pub struct NoContentResponse;

#[async_trait]
impl Writer for NoContentResponse {
    async fn write(self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        res.status_code(StatusCode::NO_CONTENT);
    }
}

impl EndpointOutRegister for NoContentResponse {
    fn register(_components: &mut oapi::Components, operation: &mut oapi::Operation) {
        operation.responses.insert(
            StatusCode::NO_CONTENT.as_str(),
            oapi::Response::new("No Content"),
        );
    }
}
