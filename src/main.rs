use legendfig::{GridWhich, LegendFig, Stretch};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let x: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
    let sin: Vec<f64> = x.iter().map(|x| x.sin()).collect();
    let damped: Vec<f64> = x.iter().map(|x| x.sin() * (-0.3 * x).exp()).collect();

    let mut fig = LegendFig::new((8., 6.), 2, true)?;
    fig.ax(0)?.xy(&x[..], &sin[..]).label("sin x").plot();
    fig.ax(0)?.set_ylabel("amplitude");
    fig.ax(1)?.xy(&x[..], &damped[..]).label("damped").color("tab:orange").plot();
    fig.ax(1)?.set_xlabel("t");
    fig.ax(1)?.set_ylabel("amplitude");

    fig.legend().ncol(2).title("curves").draw_outside(0.05)?;
    fig.pretty().stretch(Stretch::Float).grid(GridWhich::Major).apply()?;
    fig.figure(Some("target/demo.png".as_ref()))?;
    Ok(())
}
