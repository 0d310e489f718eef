use utoipa::OpenApi;

use crate::modules::playback::dto::{DescriptorResponse, HlsLinks};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::playback::handler::get_descriptor,
        crate::modules::playback::handler::get_master,
        crate::modules::playback::handler::get_variant,
        crate::modules::playback::handler::get_segment,
        crate::modules::playback::handler::get_thumbnail,
    ),
    components(
        schemas(DescriptorResponse, HlsLinks)
    ),
    tags(
        (name = "Playback", description = "HLS playback proxy")
    )
)]
pub struct ApiDoc;
