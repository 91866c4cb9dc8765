use microdiff::Graph;
use microdiff_macro::microdiff;

#[test]
fn builds_named_graph() {
    let graph = Graph::new();
    microdiff!(graph, {
        let a = 2.;
        let b = -3;
        let c = a * b + 6.7;
        let d = relu(c);
    });

    assert_eq!(a.name().as_deref(), Some("a"));
    assert_eq!(b.value(), -3.);
    assert!((d.value() - 0.7).abs() < 1e-12);
    d.backward_propagate().unwrap();
    assert_eq!(a.gradient(), -3.);
    assert_eq!(b.gradient(), 2.);
}

#[test]
fn powers_and_negation() {
    let graph = Graph::new();
    microdiff!(&graph, {
        let x = 3.;
        let y = -x.powf(2) / (x - 1.);
    });

    assert_eq!(y.value(), -4.5);
    y.backward_propagate().unwrap();
    // d/dx -x^2 / (x - 1) = -(x^2 - 2x) / (x - 1)^2
    assert!((x.gradient() + 0.75).abs() < 1e-12);
}
