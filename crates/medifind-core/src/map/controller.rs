//! Marker, selection and route state for one map view.

use tracing::{debug, error};

use super::directions::{DirectionsResult, DirectionsService, RouteInfo};
use super::geometry::{directions_url, Bounds, LatLng, DEFAULT_CENTER, DEFAULT_ZOOM};
use crate::models::NormalizedStore;

pub const FIT_PADDING: u32 = 50;
pub const SELECT_ZOOM: u8 = 16;
pub const USER_ZOOM: u8 = 15;
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 21;

pub const OPEN_COLOR: &str = "#10B981";
pub const CLOSED_COLOR: &str = "#EF4444";
pub const USER_COLOR: &str = "#3B82F6";

/// Everything a map widget needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    /// `None` for the user-location marker
    pub store_id: Option<String>,
    pub position: LatLng,
    pub title: String,
    pub color: &'static str,
    pub label: Option<String>,
    /// Icon size in px (width, height)
    pub size: (u32, u32),
    /// Icon anchor in px, measured from the top-left
    pub anchor: (u32, u32),
    pub z_index: i32,
    pub nearest: bool,
}

impl MarkerSpec {
    /// Marker for the store at `index` in distance order.
    pub fn for_store(store: &NormalizedStore, index: usize) -> Self {
        let nearest = index == 0;
        let (title, size, anchor, z_index) = if nearest {
            (format!("👑 NEAREST: {}", store.name), (65, 90), (32, 90), 1000)
        } else {
            (store.name.clone(), (50, 60), (25, 60), 100 - index as i32)
        };

        Self {
            store_id: Some(store.id.clone()),
            position: LatLng::new(store.latitude, store.longitude),
            title,
            color: if store.is_open { OPEN_COLOR } else { CLOSED_COLOR },
            label: Some((index + 1).to_string()),
            size,
            anchor,
            z_index,
            nearest,
        }
    }

    pub fn for_user(location: LatLng) -> Self {
        Self {
            store_id: None,
            position: location,
            title: "Your Location".to_string(),
            color: USER_COLOR,
            label: None,
            size: (24, 24),
            anchor: (12, 12),
            z_index: 1000,
            nearest: false,
        }
    }
}

/// The drawing side of a map widget.
pub trait MapSurface {
    fn replace_markers(&mut self, markers: &[MarkerSpec]);
    fn set_user_marker(&mut self, marker: Option<&MarkerSpec>);
    fn fit_bounds(&mut self, bounds: Bounds, padding: u32);
    fn pan_to(&mut self, center: LatLng);
    fn set_zoom(&mut self, zoom: u8);
    fn show_route(&mut self, route: &RouteInfo);
    fn clear_route(&mut self);
}

/// Route display state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RouteState {
    #[default]
    Idle,
    Calculating { generation: u64 },
    Shown(RouteInfo),
    /// The last calculation settled without a route
    Unavailable,
}

/// Ticket for an in-flight route calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub generation: u64,
    pub store_id: String,
    pub origin: LatLng,
    pub destination: LatLng,
}

/// Binds normalized stores and the user location onto a [`MapSurface`].
pub struct MapController<S: MapSurface> {
    surface: S,
    stores: Vec<NormalizedStore>,
    user_location: Option<LatLng>,
    markers: Vec<MarkerSpec>,
    selected: Option<String>,
    route: RouteState,
    generation: u64,
    zoom: u8,
}

impl<S: MapSurface> MapController<S> {
    /// Set up the view centred on the user, or on the default city.
    pub fn new(mut surface: S, user_location: Option<LatLng>) -> Self {
        surface.pan_to(user_location.unwrap_or(DEFAULT_CENTER));
        surface.set_zoom(DEFAULT_ZOOM);
        if let Some(location) = user_location {
            surface.set_user_marker(Some(&MarkerSpec::for_user(location)));
        }

        Self {
            surface,
            stores: Vec::new(),
            user_location,
            markers: Vec::new(),
            selected: None,
            route: RouteState::Idle,
            generation: 0,
            zoom: DEFAULT_ZOOM,
        }
    }

    /// Replace the result set. Markers are rebuilt from scratch.
    pub fn set_stores(&mut self, stores: Vec<NormalizedStore>) {
        self.stores = stores;

        let still_listed = self
            .selected
            .as_ref()
            .map(|id| self.stores.iter().any(|s| &s.id == id))
            .unwrap_or(true);
        if !still_listed {
            self.deselect();
        }

        self.rebuild();
    }

    pub fn set_user_location(&mut self, location: Option<LatLng>) {
        self.user_location = location;
        let marker = location.map(MarkerSpec::for_user);
        self.surface.set_user_marker(marker.as_ref());
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.markers = self
            .stores
            .iter()
            .enumerate()
            .map(|(index, store)| MarkerSpec::for_store(store, index))
            .collect();
        self.surface.replace_markers(&self.markers);

        if self.markers.is_empty() {
            return;
        }

        let points = self
            .markers
            .iter()
            .map(|m| m.position)
            .chain(self.user_location);
        if let Some(bounds) = Bounds::covering(points) {
            self.surface.fit_bounds(bounds, FIT_PADDING);
        }
    }

    /// Select a store by id. Returns `false` if it is not in the result set.
    pub fn select(&mut self, store_id: &str) -> bool {
        let Some(position) = self
            .stores
            .iter()
            .find(|s| s.id == store_id)
            .map(|s| LatLng::new(s.latitude, s.longitude))
        else {
            return false;
        };

        self.clear_route();
        self.selected = Some(store_id.to_string());
        self.surface.pan_to(position);
        self.set_zoom(SELECT_ZOOM);
        true
    }

    /// Close the detail panel. Any route goes with it.
    pub fn deselect(&mut self) {
        self.selected = None;
        self.clear_route();
    }

    pub fn selected_store(&self) -> Option<&NormalizedStore> {
        let id = self.selected.as_ref()?;
        self.stores.iter().find(|s| &s.id == id)
    }

    /// External turn-by-turn link for the selected store.
    pub fn selected_directions_url(&self) -> Option<String> {
        self.selected_store()
            .map(|s| directions_url(LatLng::new(s.latitude, s.longitude)))
    }

    /// Remove the route and abandon any calculation in flight.
    pub fn clear_route(&mut self) {
        self.generation += 1;
        self.route = RouteState::Idle;
        self.surface.clear_route();
    }

    /// Start a route calculation for the selected store. Supersedes any
    /// earlier one. `None` without a selection or a user location.
    pub fn begin_route(&mut self) -> Option<RouteRequest> {
        let origin = self.user_location?;
        let store = self.selected_store()?;
        let store_id = store.id.clone();
        let destination = LatLng::new(store.latitude, store.longitude);

        self.generation += 1;
        self.route = RouteState::Calculating {
            generation: self.generation,
        };

        Some(RouteRequest {
            generation: self.generation,
            store_id,
            origin,
            destination,
        })
    }

    /// Apply the result of `request`. Returns `false` when the request was
    /// superseded or its store is no longer selected.
    pub fn finish_route(&mut self, request: &RouteRequest, result: DirectionsResult<RouteInfo>) -> bool {
        let current = request.generation == self.generation
            && self.selected.as_deref() == Some(request.store_id.as_str());
        if !current {
            debug!(generation = request.generation, "discarding stale route result");
            return false;
        }

        match result {
            Ok(info) => {
                self.surface.show_route(&info);
                self.route = RouteState::Shown(info);
            }
            Err(e) => {
                error!(error = %e, store_id = %request.store_id, "Error calculating route");
                self.route = RouteState::Unavailable;
            }
        }
        true
    }

    /// Begin, await and apply a route in one step.
    pub async fn calculate_route(&mut self, directions: &dyn DirectionsService) -> Option<&RouteInfo> {
        let request = self.begin_route()?;
        let result = directions.route(request.origin, request.destination).await;
        self.finish_route(&request, result);
        self.route_info()
    }

    pub fn route_info(&self) -> Option<&RouteInfo> {
        match &self.route {
            RouteState::Shown(info) => Some(info),
            _ => None,
        }
    }

    /// Pan to the user at street zoom. `false` without a location.
    pub fn center_on_user(&mut self) -> bool {
        let Some(location) = self.user_location else {
            return false;
        };
        self.surface.pan_to(location);
        self.set_zoom(USER_ZOOM);
        true
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom.saturating_add(1));
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom.saturating_sub(1));
    }

    fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.surface.set_zoom(self.zoom);
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn markers(&self) -> &[MarkerSpec] {
        &self.markers
    }

    pub fn stores(&self) -> &[NormalizedStore] {
        &self.stores
    }

    pub fn route_state(&self) -> &RouteState {
        &self.route
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::DirectionsError;
    use crate::models::NormalizedMedicine;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Markers(usize),
        UserMarker(bool),
        Fit(Bounds, u32),
        Pan(LatLng),
        Zoom(u8),
        ShowRoute(String),
        ClearRoute,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl Recorder {
        fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl MapSurface for Recorder {
        fn replace_markers(&mut self, markers: &[MarkerSpec]) {
            self.calls.push(Call::Markers(markers.len()));
        }
        fn set_user_marker(&mut self, marker: Option<&MarkerSpec>) {
            self.calls.push(Call::UserMarker(marker.is_some()));
        }
        fn fit_bounds(&mut self, bounds: Bounds, padding: u32) {
            self.calls.push(Call::Fit(bounds, padding));
        }
        fn pan_to(&mut self, center: LatLng) {
            self.calls.push(Call::Pan(center));
        }
        fn set_zoom(&mut self, zoom: u8) {
            self.calls.push(Call::Zoom(zoom));
        }
        fn show_route(&mut self, route: &RouteInfo) {
            self.calls.push(Call::ShowRoute(route.distance_text.clone()));
        }
        fn clear_route(&mut self) {
            self.calls.push(Call::ClearRoute);
        }
    }

    fn store(id: &str, lat: f64, lng: f64, is_open: bool, rank: usize) -> NormalizedStore {
        NormalizedStore {
            id: id.into(),
            name: format!("Pharmacy {}", id),
            address: String::new(),
            full_address: String::new(),
            phone: String::new(),
            email: String::new(),
            rating: 4.0,
            total_reviews: 0,
            is_open,
            opening_hours: "9:00 AM - 9:00 PM".into(),
            store_image_url: None,
            latitude: lat,
            longitude: lng,
            distance_km: None,
            medicine: NormalizedMedicine::default(),
            rank,
        }
    }

    fn info(distance: &str) -> RouteInfo {
        RouteInfo {
            distance_text: distance.into(),
            duration_text: "5 mins".into(),
            polyline: None,
        }
    }

    fn user() -> LatLng {
        LatLng::new(19.0, 72.8)
    }

    #[test]
    fn test_nearest_marker_styling() {
        let stores = vec![store("a", 19.01, 72.81, true, 1), store("b", 19.02, 72.82, false, 2)];
        let nearest = MarkerSpec::for_store(&stores[0], 0);
        let other = MarkerSpec::for_store(&stores[1], 1);

        assert_eq!(nearest.title, "👑 NEAREST: Pharmacy a");
        assert_eq!((nearest.size, nearest.anchor, nearest.z_index), ((65, 90), (32, 90), 1000));
        assert_eq!(nearest.color, OPEN_COLOR);

        assert_eq!(other.title, "Pharmacy b");
        assert_eq!((other.size, other.anchor, other.z_index), ((50, 60), (25, 60), 99));
        assert_eq!(other.color, CLOSED_COLOR);
        assert_eq!(other.label.as_deref(), Some("2"));
    }

    #[test]
    fn test_rebuild_fits_markers_and_user_once() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.surface_mut().take();

        map.set_stores(vec![store("a", 19.05, 72.85, true, 1), store("b", 19.10, 72.90, true, 2)]);
        let calls = map.surface_mut().take();

        let fits: Vec<&Call> = calls.iter().filter(|c| matches!(c, Call::Fit(..))).collect();
        assert_eq!(fits.len(), 1);
        match fits[0] {
            Call::Fit(bounds, padding) => {
                assert_eq!(*padding, 50);
                assert!(bounds.contains(user()));
                assert!(bounds.contains(LatLng::new(19.10, 72.90)));
            }
            _ => unreachable!(),
        }
        assert_eq!(calls[0], Call::Markers(2));
    }

    #[test]
    fn test_empty_results_do_not_fit() {
        let mut map = MapController::new(Recorder::default(), None);
        map.surface_mut().take();

        map.set_stores(Vec::new());
        assert_eq!(map.surface_mut().take(), vec![Call::Markers(0)]);
    }

    #[test]
    fn test_select_pans_and_zooms() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1)]);
        map.surface_mut().take();

        assert!(map.select("a"));
        assert!(!map.select("missing"));
        assert_eq!(map.selected_store().map(|s| s.id.as_str()), Some("a"));
        assert_eq!(
            map.surface_mut().take(),
            vec![Call::ClearRoute, Call::Pan(LatLng::new(19.05, 72.85)), Call::Zoom(16)]
        );
    }

    #[test]
    fn test_deselect_clears_route() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1)]);
        map.select("a");

        let request = map.begin_route().unwrap();
        assert!(map.finish_route(&request, Ok(info("3 km"))));
        assert!(map.route_info().is_some());

        map.deselect();
        assert!(map.route_info().is_none());
        assert!(map.selected_store().is_none());
    }

    #[test]
    fn test_newer_route_supersedes_older() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1), store("b", 19.10, 72.90, true, 2)]);
        map.select("a");

        let first = map.begin_route().unwrap();
        let second = map.begin_route().unwrap();

        assert!(!map.finish_route(&first, Ok(info("old"))));
        assert!(map.finish_route(&second, Ok(info("new"))));
        assert_eq!(map.route_info().unwrap().distance_text, "new");
    }

    #[test]
    fn test_route_for_previous_selection_is_dropped() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1), store("b", 19.10, 72.90, true, 2)]);
        map.select("a");
        let request = map.begin_route().unwrap();

        map.select("b");
        assert!(!map.finish_route(&request, Ok(info("to a"))));
        assert_eq!(map.route_state(), &RouteState::Idle);
    }

    #[test]
    fn test_route_failure_settles_as_unavailable() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1)]);
        map.select("a");

        let request = map.begin_route().unwrap();
        assert!(map.finish_route(&request, Err(DirectionsError::NoRoute)));
        assert_eq!(map.route_state(), &RouteState::Unavailable);
        assert!(map.route_info().is_none());
    }

    #[test]
    fn test_route_needs_location_and_selection() {
        let mut map = MapController::new(Recorder::default(), None);
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1)]);
        assert!(map.begin_route().is_none());

        map.select("a");
        assert!(map.begin_route().is_none());
    }

    #[test]
    fn test_zoom_controls() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        assert_eq!(map.zoom(), 14);

        assert!(map.center_on_user());
        assert_eq!(map.zoom(), 15);

        map.zoom_in();
        assert_eq!(map.zoom(), 16);
        for _ in 0..30 {
            map.zoom_out();
        }
        assert_eq!(map.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_selection_dropped_when_store_leaves_results() {
        let mut map = MapController::new(Recorder::default(), Some(user()));
        map.set_stores(vec![store("a", 19.05, 72.85, true, 1)]);
        map.select("a");

        map.set_stores(vec![store("b", 19.10, 72.90, true, 1)]);
        assert!(map.selected_store().is_none());
    }
}
