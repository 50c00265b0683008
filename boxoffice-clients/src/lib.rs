//! Outbound adapters for the boxoffice service.
//!
//! Ports define the interfaces for the catalog, seating, payment, and
//! notification services. Adapters implement these ports: HTTP variants for
//! real deployments, stub variants for tests and development.

#![warn(clippy::all)]

pub mod error;
pub mod http;
pub mod ports;
pub mod stub;

pub use error::ClientError;
pub use http::{
    HttpCatalogClient, HttpNotificationClient, HttpPaymentClient, HttpSeatingClient,
};
pub use ports::{
    AllocateSeatsRequest, AllocateSeatsResponse, CatalogPort, ChargeRequest, ChargeResponse,
    ChargeStatus, EventInfo, EventStatus, NotificationPort, PaymentPort, RefundRequest,
    RefundResponse, ReleaseSeatsRequest, ReserveSeatsRequest, ReserveSeatsResponse, Seat,
    SeatingPort,
};
pub use stub::{StubCatalog, StubNotification, StubPayment, StubSeating};
