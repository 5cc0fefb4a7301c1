//! # Delaunay triangulation of sparse field positions
//!
//! Points are inserted in lexicographic order, each new point being connected to the part of the
//! convex hull visible from it. This always produces a valid triangulation of the convex hull,
//! which is then turned into a Delaunay one through Lawson edge flips.

use nalgebra as na;
use std::collections::{HashMap, HashSet};

const ORIENT_EPS: f64 = 1e-12;
const INCIRCLE_EPS: f64 = 1e-9;

/// Triangle mesh over a set of points.
///
/// Triangles are stored as counter-clockwise index triples into the point set the mesh was built
/// from (counter-clockwise in a y-up frame, which is clockwise on screen).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Triangulation {
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    /// Triangulate a point set.
    ///
    /// Duplicate points take no part in the mesh. If there are less than 3 distinct points, or
    /// they all lie on a single line, the resulting mesh is empty.
    pub fn new(points: &[na::Point2<f64>]) -> Self {
        let mut order = (0..points.len())
            .filter(|&i| points[i].x.is_finite() && points[i].y.is_finite())
            .collect::<Vec<_>>();

        order.sort_by(|&a, &b| {
            let (a, b) = (points[a], points[b]);
            a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
        });
        order.dedup_by(|a, b| points[*a] == points[*b]);

        let mut mesh = Mesh {
            points,
            triangles: vec![],
            edges: HashMap::new(),
        };

        mesh.sweep(&order);
        mesh.legalize();

        Self {
            triangles: mesh.triangles,
        }
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Every undirected edge of the mesh, once.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let directed = self
            .triangles
            .iter()
            .flat_map(|t| [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])])
            .collect::<Vec<_>>();

        let lookup = directed.iter().copied().collect::<HashSet<_>>();

        // Interior edges appear in both directions, hull edges in one.
        directed
            .into_iter()
            .filter(|&(a, b)| a < b || !lookup.contains(&(b, a)))
            .collect()
    }
}

/// Signed double area of triangle `abc`. Positive if counter-clockwise.
pub fn orient(a: &na::Point2<f64>, b: &na::Point2<f64>, c: &na::Point2<f64>) -> f64 {
    (b - a).perp(&(c - a))
}

fn is_left(a: &na::Point2<f64>, b: &na::Point2<f64>, c: &na::Point2<f64>) -> bool {
    orient(a, b, c) > ORIENT_EPS * (b - a).norm() * (c - a).norm()
}

fn is_right(a: &na::Point2<f64>, b: &na::Point2<f64>, c: &na::Point2<f64>) -> bool {
    orient(a, b, c) < -ORIENT_EPS * (b - a).norm() * (c - a).norm()
}

/// Check whether `d` lies strictly inside the circumcircle of counter-clockwise triangle `abc`.
fn in_circle(
    a: &na::Point2<f64>,
    b: &na::Point2<f64>,
    c: &na::Point2<f64>,
    d: &na::Point2<f64>,
) -> bool {
    let (ad, bd, cd) = (a - d, b - d, c - d);
    let (ad2, bd2, cd2) = (ad.norm_squared(), bd.norm_squared(), cd.norm_squared());

    let det = ad2 * bd.perp(&cd) - bd2 * ad.perp(&cd) + cd2 * ad.perp(&bd);

    det > INCIRCLE_EPS * (ad2 + bd2 + cd2).powi(2)
}

struct Mesh<'a> {
    points: &'a [na::Point2<f64>],
    triangles: Vec<[usize; 3]>,
    /// Directed edge to the triangle containing it.
    edges: HashMap<(usize, usize), usize>,
}

impl<'a> Mesh<'a> {
    fn push(&mut self, tri: [usize; 3]) {
        self.triangles.push(tri);
        self.link(self.triangles.len() - 1);
    }

    fn link(&mut self, t: usize) {
        let tri = self.triangles[t];
        for e in 0..3 {
            self.edges.insert((tri[e], tri[(e + 1) % 3]), t);
        }
    }

    fn unlink(&mut self, t: usize) {
        let tri = self.triangles[t];
        for e in 0..3 {
            self.edges.remove(&(tri[e], tri[(e + 1) % 3]));
        }
    }

    fn third(&self, t: usize, a: usize, b: usize) -> usize {
        self.triangles[t]
            .iter()
            .copied()
            .find(|&v| v != a && v != b)
            .unwrap_or(a)
    }

    /// Insert lexicographically sorted, distinct points.
    fn sweep(&mut self, order: &[usize]) {
        let p = self.points;

        if order.len() < 3 {
            return;
        }

        // Skip over the initial run of collinear points.
        let k = match (2..order.len()).find(|&k| {
            let (a, b, c) = (&p[order[0]], &p[order[1]], &p[order[k]]);
            is_left(a, b, c) || is_right(a, b, c)
        }) {
            Some(k) => k,
            None => return,
        };

        let chain = &order[..k];
        let q = order[k];

        let mut hull = if is_left(&p[chain[0]], &p[chain[k - 1]], &p[q]) {
            for w in chain.windows(2) {
                self.push([w[0], w[1], q]);
            }
            chain.to_vec()
        } else {
            for w in chain.windows(2) {
                self.push([w[1], w[0], q]);
            }
            chain.iter().rev().copied().collect()
        };
        hull.push(q);

        for &v in &order[k + 1..] {
            let m = hull.len();

            let visible = (0..m)
                .map(|i| is_right(&p[hull[i]], &p[hull[(i + 1) % m]], &p[v]))
                .collect::<Vec<_>>();

            let start = match (0..m).find(|&i| visible[i] && !visible[(i + m - 1) % m]) {
                Some(start) => start,
                None => {
                    log::warn!("point {v} sees no hull edge, skipping");
                    continue;
                }
            };

            let cnt = (0..m)
                .take_while(|j| visible[(start + j) % m])
                .count();

            for j in 0..cnt {
                let a = hull[(start + j) % m];
                let b = hull[(start + j + 1) % m];
                self.push([b, a, v]);
            }

            hull.rotate_left(start);
            let tail = hull.split_off(cnt);
            hull.truncate(1);
            hull.push(v);
            hull.extend(tail);
        }
    }

    /// Flip edges until every one of them is locally Delaunay.
    fn legalize(&mut self) {
        let p = self.points;

        let mut stack = self
            .triangles
            .iter()
            .flat_map(|t| [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])])
            .collect::<Vec<_>>();
        let mut budget = 16 * self.triangles.len() * self.triangles.len() + 64;

        while let Some((a, b)) = stack.pop() {
            let (t, u) = match (self.edges.get(&(a, b)), self.edges.get(&(b, a))) {
                (Some(&t), Some(&u)) => (t, u),
                _ => continue,
            };

            let c = self.third(t, a, b);
            let d = self.third(u, a, b);

            if !in_circle(&p[a], &p[b], &p[c], &p[d]) {
                continue;
            }

            if budget == 0 {
                log::warn!("edge flip budget exhausted, mesh may not be Delaunay");
                break;
            }
            budget -= 1;

            self.unlink(t);
            self.unlink(u);
            self.triangles[t] = [a, d, c];
            self.triangles[u] = [d, b, c];
            self.link(t);
            self.link(u);

            stack.extend([(a, d), (d, b), (b, c), (c, a)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn convex_hull_area(points: &[na::Point2<f64>]) -> f64 {
        let mut pts = points.to_vec();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

        let mut hull: Vec<na::Point2<f64>> = vec![];

        for pass in 0..2 {
            let start = hull.len();
            let iter: Box<dyn Iterator<Item = &na::Point2<f64>>> = if pass == 0 {
                Box::new(pts.iter())
            } else {
                Box::new(pts.iter().rev())
            };
            for p in iter {
                while hull.len() >= start + 2
                    && orient(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
                {
                    hull.pop();
                }
                hull.push(*p);
            }
            hull.pop();
        }

        (0..hull.len())
            .map(|i| {
                let (a, b) = (hull[i], hull[(i + 1) % hull.len()]);
                a.x * b.y - b.x * a.y
            })
            .sum::<f64>()
            * 0.5
    }

    fn random_points(n: usize, seed: u64) -> Vec<na::Point2<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| na::Point2::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)))
            .collect()
    }

    fn check_valid(points: &[na::Point2<f64>], mesh: &Triangulation) {
        let mut directed = std::collections::HashSet::new();
        let mut area = 0.0;

        for t in mesh.triangles() {
            let o = orient(&points[t[0]], &points[t[1]], &points[t[2]]);
            assert!(o > 0.0, "triangle {t:?} is not counter-clockwise");
            area += o * 0.5;
            for e in 0..3 {
                assert!(
                    directed.insert((t[e], t[(e + 1) % 3])),
                    "directed edge used twice"
                );
            }
        }

        let hull = convex_hull_area(points);
        assert_approx_eq!(area, hull, hull * 1e-9);
    }

    #[test]
    fn covers_convex_hull() {
        for seed in 0..5 {
            let points = random_points(300, seed);
            let mesh = Triangulation::new(&points);
            assert!(!mesh.is_empty());
            check_valid(&points, &mesh);
        }
    }

    #[test]
    fn is_delaunay() {
        let points = random_points(150, 42);
        let mesh = Triangulation::new(&points);

        for t in mesh.triangles() {
            let (a, b, c) = (&points[t[0]], &points[t[1]], &points[t[2]]);
            for (i, d) in points.iter().enumerate() {
                if t.contains(&i) {
                    continue;
                }
                assert!(!in_circle(a, b, c, d), "point {i} inside circumcircle of {t:?}");
            }
        }
    }

    #[test]
    fn grid_with_collinear_hull() {
        let points = (0..8)
            .flat_map(|y| (0..8).map(move |x| na::Point2::new(x as f64 * 8.0, y as f64 * 8.0)))
            .collect::<Vec<_>>();

        let mesh = Triangulation::new(&points);
        assert_eq!(mesh.len(), 2 * 7 * 7);
        check_valid(&points, &mesh);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(Triangulation::new(&[]).is_empty());

        let two = [na::Point2::new(0.0, 0.0), na::Point2::new(1.0, 1.0)];
        assert!(Triangulation::new(&two).is_empty());

        let line = (0..10)
            .map(|i| na::Point2::new(i as f64, 2.0 * i as f64))
            .collect::<Vec<_>>();
        assert!(Triangulation::new(&line).is_empty());
    }

    #[test]
    fn duplicates_are_ignored() {
        let points = [
            na::Point2::new(0.0, 0.0),
            na::Point2::new(10.0, 0.0),
            na::Point2::new(0.0, 0.0),
            na::Point2::new(0.0, 10.0),
            na::Point2::new(10.0, 0.0),
        ];

        let mesh = Triangulation::new(&points);
        assert_eq!(mesh.len(), 1);
        check_valid(&points, &mesh);
        assert_eq!(mesh.edges().len(), 3);
    }

    #[test]
    fn collinear_prefix() {
        // First three points in sweep order share a vertical line.
        let points = [
            na::Point2::new(0.0, 0.0),
            na::Point2::new(0.0, 5.0),
            na::Point2::new(0.0, 10.0),
            na::Point2::new(4.0, 5.0),
            na::Point2::new(6.0, 4.0),
        ];

        let mesh = Triangulation::new(&points);
        check_valid(&points, &mesh);
        assert_eq!(mesh.len(), 4);
    }
}
