//! Range based neighbour discovery.
//!
//! Links are recomputed from scratch every tick and carry no state between ticks.
//! The naive pass is `O(V·R + V²)` and is the reference behaviour, [`LinkDetection::Grid`]
//! is a faster alternative that must always agree with it exactly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    entity::{Entity, EntityId},
    geometry::distance,
    units::{Length, Unit},
};

/// Grid cells are made a hair wider than the radius so rounding in the
/// cell index can never put an in-range pair two cells apart.
const GRID_SLACK: f64 = 1.0 + 1e-6;

/// Farther than this many cells from the origin the index rounding outgrows
/// [`GRID_SLACK`], so such snapshots use the naive pass.
const MAX_CELL_INDEX: f64 = (1u64 << 30) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkClass {
    /// Roadside unit to vehicle
    Rtv,
    /// Vehicle to vehicle
    Vtv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: EntityId,
    pub target: EntityId,
    pub distance: Length,
    pub class: LinkClass,
}

/// How vehicle to vehicle links are enumerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkDetection {
    /// Every unordered pair is checked.
    #[default]
    Naive,
    /// Vehicles are bucketed into square cells the size of the radius
    /// and only neighbouring cells are compared.
    Grid,
}

impl LinkDetection {
    pub fn vehicle_links(self, vehicles: &[Entity], vtv_radius: Length) -> Vec<Link> {
        match self {
            LinkDetection::Naive => vehicle_links(vehicles, vtv_radius),
            LinkDetection::Grid => vehicle_links_grid(vehicles, vtv_radius),
        }
    }
}

/// All RTV links followed by all VTV links for the snapshot, using the naive pass.
pub fn detect_links(
    vehicles: &[Entity],
    roadside_units: &[Entity],
    rtv_radius: Length,
    vtv_radius: Length,
) -> Vec<Link> {
    let mut links = roadside_links(vehicles, roadside_units, rtv_radius);
    links.extend(vehicle_links(vehicles, vtv_radius));
    links
}

/// One link per (vehicle, roadside unit) pair within `rtv_radius`.
/// Ordered by vehicle then by roadside unit. The roadside unit is always the source.
pub fn roadside_links(
    vehicles: &[Entity],
    roadside_units: &[Entity],
    rtv_radius: Length,
) -> Vec<Link> {
    vehicles
        .iter()
        .flat_map(|vehicle| {
            roadside_units.iter().filter_map(move |rsu| {
                let dist = distance(rsu.position, vehicle.position);
                (dist <= rtv_radius).then(|| Link {
                    source: rsu.id.clone(),
                    target: vehicle.id.clone(),
                    distance: dist,
                    class: LinkClass::Rtv,
                })
            })
        })
        .collect()
}

/// Largest distance between any roadside unit and any vehicle, in range or not.
pub fn farthest_roadside_distance(vehicles: &[Entity], roadside_units: &[Entity]) -> Option<Length> {
    vehicles
        .iter()
        .flat_map(|vehicle| {
            roadside_units
                .iter()
                .map(move |rsu| distance(rsu.position, vehicle.position))
        })
        .reduce(Length::max)
}

/// One link per unordered pair of distinct vehicles within `vtv_radius`.
/// For snapshot indices `i < j` the vehicle at `i` is the source.
pub fn vehicle_links(vehicles: &[Entity], vtv_radius: Length) -> Vec<Link> {
    let mut links = Vec::new();

    for (n, a) in vehicles.iter().enumerate() {
        for b in vehicles.iter().skip(n + 1) {
            let dist = distance(a.position, b.position);
            if dist <= vtv_radius {
                links.push(vtv_link(a, b, dist));
            }
        }
    }

    links
}

/// Same output as [`vehicle_links`], including order, but only compares
/// vehicles in neighbouring grid cells.
pub fn vehicle_links_grid(vehicles: &[Entity], vtv_radius: Length) -> Vec<Link> {
    let cell_size = vtv_radius.inner() * GRID_SLACK;

    if !(cell_size > 0.0) || !cell_size.is_finite() {
        return vehicle_links(vehicles, vtv_radius);
    }

    let indexable = vehicles.iter().all(|entity| {
        let x = entity.position.x.inner() / cell_size;
        let y = entity.position.y.inner() / cell_size;
        x.abs() <= MAX_CELL_INDEX && y.abs() <= MAX_CELL_INDEX
    });
    if !indexable {
        return vehicle_links(vehicles, vtv_radius);
    }

    let cell_of = |entity: &Entity| -> (i64, i64) {
        (
            (entity.position.x.inner() / cell_size).floor() as i64,
            (entity.position.y.inner() / cell_size).floor() as i64,
        )
    };

    let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (n, vehicle) in vehicles.iter().enumerate() {
        cells.entry(cell_of(vehicle)).or_default().push(n);
    }

    let mut found: Vec<(usize, usize, Length)> = Vec::new();

    for (n, a) in vehicles.iter().enumerate() {
        let (cx, cy) = cell_of(a);

        for dx in -1..=1i64 {
            for dy in -1..=1i64 {
                let Some(members) = cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };

                for &m in members.iter().filter(|&&m| m > n) {
                    let dist = distance(a.position, vehicles[m].position);
                    if dist <= vtv_radius {
                        found.push((n, m, dist));
                    }
                }
            }
        }
    }

    found.sort_by_key(|&(n, m, _)| (n, m));

    found
        .into_iter()
        .map(|(n, m, dist)| vtv_link(&vehicles[n], &vehicles[m], dist))
        .collect()
}

fn vtv_link(a: &Entity, b: &Entity, dist: Length) -> Link {
    Link {
        source: a.id.clone(),
        target: b.id.clone(),
        distance: dist,
        class: LinkClass::Vtv,
    }
}
