// Application state for HTTP handlers
use crate::application::cleaning_service::CleaningService;
use crate::application::entity_service::EntityService;
use crate::application::scan_request::ScanDefaults;

pub struct AppState {
    pub cleaning_service: CleaningService,
    pub entity_service: EntityService,
    pub scan_defaults: ScanDefaults,
}
