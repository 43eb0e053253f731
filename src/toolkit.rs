use crate::config::TravelConfig;
use crate::error::Result;
use crate::tool::ToolRegistry;
use crate::tools::{
    BudgetTool, DestinationMatcherTool, FlightSearchTool, PlaceCategory, PlaceSearchTool,
    StructuredOutputFormatterTool,
};

/// Every travel-planning tool, with HTTP clients built from `config`.
pub fn travel_toolkit(config: &TravelConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(DestinationMatcherTool)?;
    registry.register(FlightSearchTool::new(config)?)?;
    registry.register(PlaceSearchTool::new(PlaceCategory::Hotel, config)?)?;
    registry.register(PlaceSearchTool::new(PlaceCategory::Activity, config)?)?;
    registry.register(PlaceSearchTool::new(PlaceCategory::Restaurant, config)?)?;
    registry.register(BudgetTool)?;
    registry.register(StructuredOutputFormatterTool)?;
    Ok(registry)
}

/// Tools that never touch the network.
pub fn offline_toolkit() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(DestinationMatcherTool)?;
    registry.register(BudgetTool)?;
    registry.register(StructuredOutputFormatterTool)?;
    Ok(registry)
}
