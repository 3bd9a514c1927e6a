//! Request and response data model

pub mod request;
pub mod response;

pub use request::{
    merge_options, FilePart, Headers, HttpMethod, MultipartForm, Params, Request, RequestBody,
    RequestOptions, ResponseType,
};
pub use response::{ApiResponse, RateLimitMeta, ResponseBody, ResponseMeta};
