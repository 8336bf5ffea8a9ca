// Application layer - Detection, the anomaly list, and the operations on it
pub mod anomaly_book;
pub mod cleaning_service;
pub mod detection;
pub mod entity_service;
pub mod scan_request;
pub mod series_repository;
