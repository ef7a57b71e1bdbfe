mod common;

use approx::assert_abs_diff_eq;
use cyclegan::{
    core::scalar,
    learner::{partial, AvgMetric, Kwargs, LossMetric, Metric, NamedFn},
};
use tch::{Device, Kind, Tensor};

fn mean_of_last(args: &[Tensor], _: &Kwargs) -> f64 {
    scalar(&args[args.len() - 1].mean(Kind::Double))
}

fn load_batch(learn: &mut cyclegan::learner::Learner, n: i64, value: f64) {
    let real_a = Tensor::full(&[n, 3, 4, 4], value, (Kind::Float, Device::Cpu));
    let real_b = Tensor::full(&[n, 3, 4, 4], value, (Kind::Float, Device::Cpu));
    learn.pred = Some(learn.model.forward(&real_a, &real_b));
    learn.xb = vec![real_a, real_b.shallow_clone()];
    learn.yb = vec![real_b];
}

#[test]
fn average_is_weighted_by_batch_size() {
    let mut learn = common::learner(common::dls(2, None, 2));
    let mut metric = AvgMetric::new(Box::new(NamedFn::new("mean_of_last", mean_of_last)), false);
    metric.reset();
    assert_eq!(metric.value(), None);

    load_batch(&mut learn, 2, 1.);
    metric.accumulate(&learn).unwrap();
    assert_abs_diff_eq!(metric.value().unwrap(), 1., epsilon = 1e-9);

    load_batch(&mut learn, 4, 4.);
    metric.accumulate(&learn).unwrap();
    assert_abs_diff_eq!(metric.value().unwrap(), (2. * 1. + 4. * 4.) / 6., epsilon = 1e-9);

    metric.reset();
    assert_eq!(metric.value(), None);
}

#[test]
fn decoding_undoes_the_normalization() {
    let mut learn = common::learner(common::dls(2, None, 2));
    let mut metric = AvgMetric::new(Box::new(NamedFn::new("mean_of_last", mean_of_last)), true);
    // Normalized 0 is 0.5 in image space.
    load_batch(&mut learn, 2, 0.);
    metric.accumulate(&learn).unwrap();
    assert_abs_diff_eq!(metric.value().unwrap(), 0.5, epsilon = 1e-6);
}

#[test]
fn metric_name_unwraps_partial() {
    let func = partial(NamedFn::new("psnr", mean_of_last), [("max", 1.)]);
    let metric = AvgMetric::new(Box::new(func), true);
    assert_eq!(metric.name(), "psnr");
}

#[test]
fn loss_metric_waits_for_its_term() {
    let mut learn = common::learner(common::dls(2, None, 2));
    let mut metric = LossMetric::new("D_A_loss");
    load_batch(&mut learn, 2, 0.);
    learn.loss_func.set_input(&learn.xb[0], &learn.xb[1]);
    let pred = learn.pred.take().unwrap();
    learn.loss_func.generator_loss(&pred).unwrap();
    learn.pred = Some(pred);

    // Only generator terms exist so far.
    metric.accumulate(&learn).unwrap();
    assert_eq!(metric.value(), None);

    let mut id_loss = LossMetric::new("id_loss_A");
    id_loss.accumulate(&learn).unwrap();
    assert_eq!(id_loss.value(), learn.loss_func.components().id_loss_a);
}
