use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::Context;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::geofile::{feature::Feature, tags::Tags};

#[derive(Debug, Default)]
struct NodeData {
    id: i64,
    version: Option<u32>,
    lon: f64,
    lat: f64,
    tags: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct WayData {
    id: i64,
    version: Option<u32>,
    refs: Vec<i64>,
    tags: Vec<(String, String)>,
}

#[derive(Debug)]
enum Element {
    Node(NodeData),
    Way(WayData),
}

impl Element {
    fn tags_mut(&mut self) -> &mut Vec<(String, String)> {
        match self {
            Element::Node(node) => &mut node.tags,
            Element::Way(way) => &mut way.tags,
        }
    }
}

/// Everything collected from one OSM XML document.
#[derive(Debug, Default)]
struct OsmData {
    node_coords: HashMap<i64, geo::Coord>,
    tagged_nodes: Vec<NodeData>,
    ways: Vec<WayData>,
}

impl OsmData {
    fn finish(&mut self, element: Element) {
        match element {
            Element::Node(mut node) => {
                self.node_coords.insert(
                    node.id,
                    geo::Coord {
                        x: node.lon,
                        y: node.lat,
                    },
                );
                // TIGER import tags carry no information worth conflating.
                node.tags.retain(|(key, _)| !key.starts_with("tiger:"));
                // Untagged nodes only provide way geometry.
                if !node.tags.is_empty() {
                    self.tagged_nodes.push(node);
                }
            }
            Element::Way(way) => self.ways.push(way),
        }
    }
}

fn get_attr_value(event: &BytesStart<'_>, key: &[u8]) -> anyhow::Result<Option<String>> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

fn parse_attr<T: std::str::FromStr>(
    event: &BytesStart<'_>,
    key: &[u8],
) -> anyhow::Result<Option<T>> {
    Ok(get_attr_value(event, key)?.and_then(|value| value.parse().ok()))
}

/// Handle an opening (or self-closing) element. Returns the element when it is complete.
fn start_element(
    event: &BytesStart<'_>,
    current: &mut Option<Element>,
) -> anyhow::Result<Option<Element>> {
    match event.name().as_ref() {
        b"node" => {
            let id = parse_attr(event, b"id")?;
            let lat = parse_attr(event, b"lat")?;
            let lon = parse_attr(event, b"lon")?;
            match (id, lat, lon) {
                (Some(id), Some(lat), Some(lon)) => {
                    return Ok(Some(Element::Node(NodeData {
                        id,
                        version: parse_attr(event, b"version")?,
                        lon,
                        lat,
                        tags: Vec::new(),
                    })))
                }
                _ => log::warn!("Skipping node without id or coordinates"),
            }
        }
        b"way" => match parse_attr(event, b"id")? {
            Some(id) => {
                return Ok(Some(Element::Way(WayData {
                    id,
                    version: parse_attr(event, b"version")?,
                    ..Default::default()
                })))
            }
            None => log::warn!("Skipping way without id"),
        },
        b"nd" => {
            if let Some(Element::Way(way)) = current.as_mut() {
                if let Some(reference) = parse_attr(event, b"ref")? {
                    way.refs.push(reference);
                }
            }
        }
        b"tag" => {
            if let Some(element) = current.as_mut() {
                let key = get_attr_value(event, b"k")?;
                let value = get_attr_value(event, b"v")?;
                if let (Some(key), Some(value)) = (key, value) {
                    element.tags_mut().push((key, value.trim().to_string()));
                }
            }
        }
        _ => {}
    }
    Ok(None)
}

fn parse_osm_xml<R: BufRead>(input: R) -> anyhow::Result<OsmData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut data = OsmData::default();
    let mut current: Option<Element> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                if let Some(element) = start_element(&e, &mut current)? {
                    current = Some(element);
                }
            }
            Event::Empty(e) => {
                if let Some(element) = start_element(&e, &mut current)? {
                    data.finish(element);
                }
            }
            Event::End(e) => {
                if matches!(e.name().as_ref(), b"node" | b"way") {
                    if let Some(element) = current.take() {
                        data.finish(element);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(data)
}

fn element_tags(id: i64, version: Option<u32>, pairs: Vec<(String, String)>) -> Tags {
    let mut tags = Tags::from_pairs(pairs);
    tags.id = Some(id);
    tags.version = Some(version.unwrap_or(1));
    tags
}

fn osm_way_to_feature(osm_data: &OsmData, way: WayData) -> anyhow::Result<Feature> {
    let mut coords = Vec::with_capacity(way.refs.len());
    for node_ref in &way.refs {
        let coord = osm_data
            .node_coords
            .get(node_ref)
            .with_context(|| format!("Way {} references missing node {}", way.id, node_ref))?;
        coords.push(*coord);
    }
    Ok(Feature {
        geometry: Some(geo::Geometry::LineString(geo::LineString::new(coords))),
        tags: element_tags(way.id, way.version, way.tags),
        refs: way.refs,
    })
}

/// Convert OSM XML into features: tagged nodes become Points, ways become LineStrings carrying
/// their node references.
pub fn read_osm_features<R: BufRead>(input: R) -> anyhow::Result<Vec<Feature>> {
    let mut osm_data = parse_osm_xml(input)?;

    let mut features: Vec<Feature> = std::mem::take(&mut osm_data.tagged_nodes)
        .into_iter()
        .map(|node| Feature {
            geometry: Some(geo::Geometry::Point(geo::Point::new(node.lon, node.lat))),
            tags: element_tags(node.id, node.version, node.tags),
            refs: Vec::new(),
        })
        .collect();

    for way in std::mem::take(&mut osm_data.ways) {
        match osm_way_to_feature(&osm_data, way) {
            Ok(feature) => features.push(feature),
            Err(err) => log::warn!("{}", err),
        }
    }
    Ok(features)
}

pub fn read_osm_features_from_file(filepath: &Path) -> anyhow::Result<Vec<Feature>> {
    let infile =
        File::open(filepath).with_context(|| format!("Opening OSM file {:?}", filepath))?;
    read_osm_features(BufReader::new(infile))
        .with_context(|| format!("Parsing OSM file {:?}", filepath))
}
