//! Clusters a submesh's index range into bounded meshlets.
//!
//! A real pipeline would delegate to `meshopt`'s cluster builder; that
//! library doesn't appear anywhere in this pack, so this binary provides a
//! straightforward greedy clusterer that satisfies the same contract
//! (`maxVerts`, `maxTris`, bounding sphere per meshlet) without pulling in a
//! crate this codebase never reaches for elsewhere.

use vasset::{
    importers::{MeshletBuild, MeshletClusterer},
    math::Vec3,
};

pub struct GreedyMeshletClusterer;

impl MeshletClusterer for GreedyMeshletClusterer {
    fn build(
        &self,
        positions: &[Vec3],
        indices: &[u32],
        max_verts: u32,
        max_tris: u32,
        _cone_weight: f32,
    ) -> Vec<MeshletBuild> {
        let mut out = Vec::new();
        let mut local_vertices: Vec<u32> = Vec::new();
        let mut remap: Vec<Option<u32>> = vec![None; positions.len()];
        let mut local_triangles: Vec<u8> = Vec::new();
        let mut triangle_count = 0u32;

        let flush = |local_vertices: &mut Vec<u32>,
                     remap: &mut Vec<Option<u32>>,
                     local_triangles: &mut Vec<u8>,
                     triangle_count: &mut u32,
                     out: &mut Vec<MeshletBuild>| {
            if local_vertices.is_empty() {
                return;
            }
            let (center, radius) = bounding_sphere(positions, local_vertices);
            out.push(MeshletBuild {
                local_vertices: std::mem::take(local_vertices),
                local_triangles: std::mem::take(local_triangles),
                center,
                radius,
            });
            for slot in remap.iter_mut() {
                *slot = None;
            }
            *triangle_count = 0;
        };

        for tri in indices.chunks_exact(3) {
            let needs_new_verts = tri
                .iter()
                .filter(|&&v| remap[v as usize].is_none())
                .count() as u32;
            let would_exceed_verts = local_vertices.len() as u32 + needs_new_verts > max_verts;
            let would_exceed_tris = triangle_count + 1 > max_tris;
            if !local_vertices.is_empty() && (would_exceed_verts || would_exceed_tris) {
                flush(&mut local_vertices, &mut remap, &mut local_triangles, &mut triangle_count, &mut out);
            }
            for &v in tri {
                let local = match remap[v as usize] {
                    Some(l) => l,
                    None => {
                        let l = local_vertices.len() as u32;
                        local_vertices.push(v);
                        remap[v as usize] = Some(l);
                        l
                    }
                };
                local_triangles.push(local as u8);
            }
            triangle_count += 1;
        }
        flush(&mut local_vertices, &mut remap, &mut local_triangles, &mut triangle_count, &mut out);
        out
    }
}

fn bounding_sphere(positions: &[Vec3], local_vertices: &[u32]) -> (Vec3, f32) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for &idx in local_vertices {
        let p = positions[idx as usize];
        for (i, c) in [p.x, p.y, p.z].into_iter().enumerate() {
            min[i] = min[i].min(c);
            max[i] = max[i].max(c);
        }
    }
    let center = Vec3::new((min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0, (min[2] + max[2]) / 2.0);
    let mut radius = 0.0f32;
    for &idx in local_vertices {
        let p = positions[idx as usize];
        let d = ((p.x - center.x).powi(2) + (p.y - center.y).powi(2) + (p.z - center.z).powi(2)).sqrt();
        radius = radius.max(d);
    }
    (center, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triangle_fits_one_meshlet() {
        let positions =
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let indices = vec![0, 1, 2];
        let clusterer = GreedyMeshletClusterer;
        let built = clusterer.build(&positions, &indices, 64, 124, 0.5);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].local_vertices.len(), 3);
        assert_eq!(built[0].local_triangles.len(), 3);
    }

    #[test]
    fn respects_max_tris_by_splitting_into_multiple_meshlets() {
        // Fan of 8 triangles sharing vertex 0, forced into meshlets of at
        // most 2 triangles each.
        let mut positions = vec![Vec3::new(0.0, 0.0, 0.0)];
        for i in 0..8u32 {
            let a = i as f32;
            positions.push(Vec3::new(a.cos(), a.sin(), 0.0));
        }
        let mut indices = Vec::new();
        for i in 1..8u32 {
            indices.extend_from_slice(&[0, i, i + 1]);
        }
        let clusterer = GreedyMeshletClusterer;
        let built = clusterer.build(&positions, &indices, 64, 2, 0.5);
        assert!(built.len() >= 4);
        for meshlet in &built {
            assert!(meshlet.local_triangles.len() / 3 <= 2);
        }
    }
}
