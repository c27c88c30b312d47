use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{Error, Result};

use super::model::Cascade;

// Just enough of a DOM to walk cascade/stages/_/weakClassifiers/_ and
// cascade/features/_/rects/_; the documents are shallow and numeric at the leaves.
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn parse_tree(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlNode> = vec![XmlNode { name: "#root".into(), text: String::new(), children: Vec::new() }];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(XmlNode { name, text: String::new(), children: Vec::new() });
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let node = XmlNode { name, text: String::new(), children: Vec::new() };
                stack
                    .last_mut()
                    .ok_or_else(|| Error::Load("unbalanced cascade xml".into()))?
                    .children
                    .push(node);
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| Error::Load("unbalanced cascade xml".into()))?;
                stack
                    .last_mut()
                    .ok_or_else(|| Error::Load("unbalanced cascade xml".into()))?
                    .children
                    .push(node);
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    stack.pop().ok_or_else(|| Error::Load("empty cascade xml document".into()))
}

fn tokens(text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|tok| tok.parse::<f64>().map_err(|e| Error::Load(format!("non-numeric token '{tok}': {e}"))))
        .collect()
}

fn required_child<'a>(node: &'a XmlNode, name: &str) -> Result<&'a XmlNode> {
    node.child(name).ok_or_else(|| Error::Load(format!("missing required element <{name}>")))
}

fn scalar(node: &XmlNode, name: &str) -> Result<f64> {
    let child = required_child(node, name)?;
    child.text.trim().parse::<f64>().map_err(|e| Error::Load(format!("<{name}> is not numeric: {e}")))
}

struct FeatureDef {
    rects: Vec<(f64, f64, f64, f64, f64)>,
}

fn parse_features(cascade_node: &XmlNode) -> Result<Vec<FeatureDef>> {
    let features_node = required_child(cascade_node, "features")?;
    let mut features = Vec::new();
    for feature_node in features_node.children_named("_") {
        let rects_node = required_child(feature_node, "rects")?;
        let mut rects = Vec::new();
        for rect_node in rects_node.children_named("_") {
            let values = tokens(&rect_node.text)?;
            if values.len() != 5 {
                return Err(Error::Load(format!(
                    "feature rect must have 5 numbers (x y w h weight), got {}",
                    values.len()
                )));
            }
            rects.push((values[0], values[1], values[2], values[3], values[4]));
        }
        if rects.is_empty() {
            return Err(Error::Load("feature has no rects".into()));
        }
        features.push(FeatureDef { rects });
    }
    Ok(features)
}

pub fn load_xml(xml: &str) -> Result<Cascade> {
    let root = parse_tree(xml)?;
    let storage = root.child("opencv_storage").ok_or_else(|| Error::Load("missing <opencv_storage> root".into()))?;
    let cascade_node = storage.child("cascade").ok_or_else(|| Error::Load("missing <cascade> element".into()))?;

    let width = scalar(cascade_node, "width")?;
    let height = scalar(cascade_node, "height")?;

    let features = parse_features(cascade_node)?;
    let stages_node = required_child(cascade_node, "stages")?;

    let mut flat = vec![width, height];

    for stage_node in stages_node.children_named("_") {
        let stage_threshold = scalar(stage_node, "stageThreshold")?;
        let weak_classifiers_node = required_child(stage_node, "weakClassifiers")?;
        let weak_nodes: Vec<&XmlNode> = weak_classifiers_node.children_named("_").collect();

        flat.push(stage_threshold);
        flat.push(weak_nodes.len() as f64);

        for weak_node in weak_nodes {
            let internal_nodes = tokens(&required_child(weak_node, "internalNodes")?.text)?;
            if internal_nodes.len() != 4 {
                return Err(Error::Load(format!(
                    "internalNodes must have 4 numbers (tilted, _, featureIndex, threshold), got {}",
                    internal_nodes.len()
                )));
            }
            let tilted = internal_nodes[0];
            let feature_index = internal_nodes[2] as usize;
            let node_threshold = internal_nodes[3];

            let leaf_values = tokens(&required_child(weak_node, "leafValues")?.text)?;
            if leaf_values.len() != 2 {
                return Err(Error::Load(format!("leafValues must have 2 numbers, got {}", leaf_values.len())));
            }

            let feature = features
                .get(feature_index)
                .ok_or_else(|| Error::Load(format!("feature index {feature_index} out of range")))?;

            flat.push(tilted);
            flat.push(feature.rects.len() as f64);
            for &(x, y, w, h, weight) in &feature.rects {
                flat.push(x);
                flat.push(y);
                flat.push(w);
                flat.push(h);
                flat.push(weight);
            }
            flat.push(node_threshold);
            flat.push(leaf_values[0]);
            flat.push(leaf_values[1]);
        }
    }

    tracing::debug!(stages = stages_node.children_named("_").count(), "loaded cascade from xml");
    Cascade::from_flat(flat)
}

pub fn to_json(cascade: &Cascade) -> Result<String> {
    serde_json::to_string(cascade.as_flat()).map_err(Error::from)
}

pub fn from_json(json: &str) -> Result<Cascade> {
    let flat: Vec<f64> = serde_json::from_str(json)?;
    Cascade::from_flat(flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<?xml version="1.0"?>
<opencv_storage>
<cascade>
  <width>20</width>
  <height>20</height>
  <stages>
    <_>
      <stageThreshold>0.5</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 -0.0125
          </internalNodes>
          <leafValues>
            -1.0 1.0
          </leafValues>
        </_>
      </weakClassifiers>
    </_>
  </stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 10 5 -1.
        </_>
        <_>
          0 5 10 5 2.
        </_>
      </rects>
      <tilted>0</tilted>
    </_>
  </features>
</cascade>
</opencv_storage>
"#;

    #[test]
    fn loading_a_cascade_produces_the_expected_flat_length() {
        let cascade = load_xml(SAMPLE).unwrap();
        assert_eq!(cascade.window_width(), 20);
        assert_eq!(cascade.window_height(), 20);

        // one stage, one weak classifier, two rects.
        let expected_len = 2 + (2 + 1 * (2 + 5 * 2 + 3));
        assert_eq!(cascade.as_flat().len(), expected_len);
    }

    #[test]
    fn json_roundtrip_preserves_the_cascade() {
        let cascade = load_xml(SAMPLE).unwrap();
        let json = to_json(&cascade).unwrap();
        let restored = from_json(&json).unwrap();
        assert_eq!(cascade.as_flat(), restored.as_flat());
    }

    #[test]
    fn missing_field_is_a_load_error_not_a_panic() {
        let broken = SAMPLE.replace("<width>20</width>", "");
        assert!(matches!(load_xml(&broken), Err(Error::Load(_))));
    }

    #[test]
    fn non_numeric_token_is_a_load_error() {
        let broken = SAMPLE.replace("-0.0125", "not-a-number");
        assert!(matches!(load_xml(&broken), Err(Error::Load(_))));
    }
}
