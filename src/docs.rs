use crate::common::response::ErrorBody;
use crate::modules::analysis::dto::{ResultResponse, StatusResponse, SubmitResponse};
use crate::modules::analysis::model::{AnalysisSummary, JobStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::analysis::handler::upload,
        crate::modules::analysis::handler::status,
        crate::modules::analysis::handler::fetch_result,
    ),
    components(
        schemas(
            SubmitResponse, StatusResponse, ResultResponse,
            AnalysisSummary, JobStatus, ErrorBody,
        )
    ),
    tags(
        (name = "Analysis", description = "Posture analysis jobs and results")
    )
)]
pub struct ApiDoc;
