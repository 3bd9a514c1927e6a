//! HTTP transport
//!
//! The request pipeline talks to the network only through the [`Transport`]
//! trait. [`ReqwestTransport`] is the production implementation; tests plug
//! in their own.

pub mod transport;

pub use transport::{
    ReqwestTransport, ReqwestTransportBuilder, Transport, TransportError, TransportRequest,
    TransportResponse,
};
